//! Entry point for the dual-role `vigild` binary.
//!
//! Delegates to [`vigild::run`], which serves as the daemon when no command
//! is supplied and otherwise validates and executes the one-shot command.

use std::io::{self, IsTerminal};
use std::process::ExitCode;

fn main() -> ExitCode {
    let stdout_is_terminal = io::stdout().is_terminal();
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    vigild::run(
        std::env::args_os(),
        &mut stdout,
        &mut stderr,
        stdout_is_terminal,
    )
}

//! Invocation handling for the dual-role `vigild` binary.
//!
//! With no command on the invocation the binary serves as the daemon. With a
//! command it takes the bootstrap path: configuration flags are consumed
//! first, the command array is validated pre-session, and the command is
//! then executed locally or forwarded to the daemon socket.
//!
//! Configuration flags must precede the command; the first bare token (or a
//! literal `--`) starts the command array.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use thiserror::Error;

use vigil_config::Config;

use crate::bootstrap::StaticConfigLoader;
use crate::client;
use crate::dispatch::OutputEncoding;
use crate::health::StructuredHealthReporter;
use crate::process;

/// A split invocation: configuration flags and the optional command.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Invocation {
    /// Program name plus every configuration flag, ready for config loading.
    pub(crate) config_args: Vec<OsString>,
    /// Command array tokens; empty when the binary should serve.
    pub(crate) command: Vec<String>,
}

/// Errors raised while splitting the invocation.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// A command token was not valid UTF-8.
    #[error("argument {position} is not valid UTF-8")]
    NonUtf8 {
        /// Zero-based position of the offending argument.
        position: usize,
    },
}

/// Splits an argument list into configuration flags and the command array.
///
/// Flags (tokens starting with `-`) and their values are collected until the
/// first bare token, which begins the command; a literal `--` ends flag
/// processing explicitly. `--flag=value` consumes one token, `--flag value`
/// consumes two.
pub(crate) fn split_invocation(
    args: impl IntoIterator<Item = OsString>,
) -> Result<Invocation, CliError> {
    let mut iter = args.into_iter().enumerate();
    let mut config_args = Vec::new();
    let mut command = Vec::new();

    if let Some((_, program)) = iter.next() {
        config_args.push(program);
    }

    let mut in_command = false;
    while let Some((position, token)) = iter.next() {
        if in_command {
            command.push(into_utf8(token, position)?);
            continue;
        }

        let is_flag = token.to_str().is_some_and(|text| text.starts_with('-'));
        if token == "--" {
            in_command = true;
        } else if is_flag {
            let has_inline_value = token.to_str().is_some_and(|text| text.contains('='));
            config_args.push(token);
            if !has_inline_value
                && let Some((_, value)) = iter.next()
            {
                config_args.push(value);
            }
        } else {
            in_command = true;
            command.push(into_utf8(token, position)?);
        }
    }

    Ok(Invocation {
        config_args,
        command,
    })
}

fn into_utf8(token: OsString, position: usize) -> Result<String, CliError> {
    token
        .into_string()
        .map_err(|_| CliError::NonUtf8 { position })
}

/// Entry point shared by the binary and its tests.
///
/// Serves as the daemon when no command is supplied; otherwise validates and
/// runs the one-shot command, writing responses to `stdout` and diagnostics
/// to `stderr`.
#[must_use]
pub fn run(
    args: impl IntoIterator<Item = OsString>,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    stdout_is_terminal: bool,
) -> ExitCode {
    let invocation = match split_invocation(args) {
        Ok(invocation) => invocation,
        Err(error) => {
            let _ = writeln!(stderr, "vigild: {error}");
            return ExitCode::FAILURE;
        }
    };

    let config = match Config::load_from_iter(invocation.config_args) {
        Ok(config) => config,
        Err(error) => {
            let _ = writeln!(stderr, "vigild: {error}");
            return ExitCode::FAILURE;
        }
    };

    if invocation.command.is_empty() {
        let loader = StaticConfigLoader::new(config);
        let reporter = Arc::new(StructuredHealthReporter::new());
        return match process::run_daemon(&loader, reporter) {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => {
                let _ = writeln!(stderr, "vigild: {error}");
                ExitCode::FAILURE
            }
        };
    }

    let encoding = if stdout_is_terminal {
        OutputEncoding::JsonPretty
    } else {
        OutputEncoding::Json
    };
    client::run_command(&config, &invocation.command, encoding, stdout, stderr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os(parts: &[&str]) -> Vec<OsString> {
        parts.iter().map(OsString::from).collect()
    }

    #[test]
    fn bare_invocation_serves() {
        let invocation = split_invocation(os(&["vigild"])).expect("split");
        assert!(invocation.command.is_empty());
        assert_eq!(invocation.config_args, os(&["vigild"]));
    }

    #[test]
    fn first_bare_token_starts_the_command() {
        let invocation =
            split_invocation(os(&["vigild", "watch", "/tmp"])).expect("split");
        assert_eq!(invocation.command, vec!["watch", "/tmp"]);
        assert_eq!(invocation.config_args, os(&["vigild"]));
    }

    #[test]
    fn flags_before_the_command_go_to_config() {
        let invocation = split_invocation(os(&[
            "vigild",
            "--log-filter",
            "debug",
            "watch",
            "/tmp",
        ]))
        .expect("split");
        assert_eq!(
            invocation.config_args,
            os(&["vigild", "--log-filter", "debug"])
        );
        assert_eq!(invocation.command, vec!["watch", "/tmp"]);
    }

    #[test]
    fn inline_flag_values_consume_one_token() {
        let invocation =
            split_invocation(os(&["vigild", "--log-filter=debug", "version"])).expect("split");
        assert_eq!(invocation.config_args, os(&["vigild", "--log-filter=debug"]));
        assert_eq!(invocation.command, vec!["version"]);
    }

    #[test]
    fn double_dash_ends_flag_processing() {
        let invocation =
            split_invocation(os(&["vigild", "--", "--not-a-flag"])).expect("split");
        assert_eq!(invocation.command, vec!["--not-a-flag"]);
    }

    #[test]
    fn flag_arguments_that_look_like_commands_stay_with_the_flag() {
        let invocation =
            split_invocation(os(&["vigild", "--log-filter", "watch"])).expect("split");
        assert!(invocation.command.is_empty());
        assert_eq!(
            invocation.config_args,
            os(&["vigild", "--log-filter", "watch"])
        );
    }
}

//! One-shot command execution for the CLI bootstrap path.
//!
//! A command supplied on the invocation is validated against the local
//! registry before anything touches the network (the fail-fast preprocess
//! pass). Commands flagged for CLI execution then run in-process; everything
//! else, including names this build does not know, is forwarded to the
//! daemon socket as a single JSONL array and the response lines are relayed
//! verbatim.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::process::ExitCode;
use std::sync::Arc;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use serde_json::Value;

use vigil_config::{Config, SocketEndpoint};

use crate::commands;
use crate::dispatch::{
    CommandFlags, CommandRegistry, CommandRequest, Dispatcher, ExecutionMode, OutputEncoding,
    Session, lookup_command, preprocess,
};
use crate::server::ServerState;

/// Exit status for a command that completed successfully.
const STATUS_OK: u8 = 0;
/// Exit status for validation failures, rejections, and transport errors.
const STATUS_FAILED: u8 = 1;

/// Validates and runs a one-shot command.
///
/// Returns a failure exit code when validation fails, the daemon is
/// unreachable, or the daemon answers with an error payload.
pub(crate) fn run_command(
    config: &Config,
    command: &[String],
    encoding: OutputEncoding,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> ExitCode {
    ExitCode::from(run_command_status(config, command, encoding, stdout, stderr))
}

fn run_command_status(
    config: &Config,
    command: &[String],
    encoding: OutputEncoding,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> u8 {
    let mut registry = CommandRegistry::new();
    commands::register_builtins(&mut registry);
    let server = Arc::new(ServerState::new(config.clone(), registry));

    let request = CommandRequest::from_values(
        command
            .iter()
            .map(|token| Value::String(token.clone()))
            .collect(),
    );

    // Fail fast before any session or connection exists.
    if preprocess(server.registry(), &request, encoding, stdout).is_err() {
        return STATUS_FAILED;
    }

    let runs_locally = matches!(
        lookup_command(server.registry(), &request, None),
        Ok(Some(definition)) if definition.flags().contains(CommandFlags::MODE_CLI)
    );

    if runs_locally {
        let dispatcher = Dispatcher::new(server);
        let mut session = Session::new(0, true, stdout);
        let ran = dispatcher.dispatch(&mut session, &request, Some(ExecutionMode::Cli));
        return if ran { STATUS_OK } else { STATUS_FAILED };
    }

    forward(config.daemon_socket(), &request, stdout, stderr)
}

/// Sends the command array to the daemon and relays its response lines.
fn forward(
    endpoint: &SocketEndpoint,
    request: &CommandRequest,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> u8 {
    let mut stream = match ClientStream::connect(endpoint) {
        Ok(stream) => stream,
        Err(error) => {
            let _ = writeln!(
                stderr,
                "vigild: unable to connect to {endpoint}: {error}; is the daemon running?"
            );
            return STATUS_FAILED;
        }
    };

    if let Err(error) = send_request(&mut stream, request) {
        let _ = writeln!(stderr, "vigild: failed to send command: {error}");
        return STATUS_FAILED;
    }

    relay_responses(stream, stdout, stderr)
}

fn send_request(stream: &mut ClientStream, request: &CommandRequest) -> io::Result<()> {
    let payload = Value::Array(request.args().to_vec());
    serde_json::to_writer(&mut *stream, &payload)?;
    stream.write_all(b"\n")?;
    stream.flush()?;
    // Half-close so the daemon sees end-of-session after this command.
    stream.shutdown_write()
}

fn relay_responses(stream: ClientStream, stdout: &mut dyn Write, stderr: &mut dyn Write) -> u8 {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let mut saw_error = false;
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                saw_error = saw_error || line_is_error(&line);
                if stdout.write_all(line.as_bytes()).is_err() {
                    return STATUS_FAILED;
                }
            }
            Err(error) => {
                let _ = writeln!(stderr, "vigild: failed to read response: {error}");
                return STATUS_FAILED;
            }
        }
    }
    let _ = stdout.flush();
    if saw_error { STATUS_FAILED } else { STATUS_OK }
}

/// Returns whether a response line carries an error payload.
fn line_is_error(line: &str) -> bool {
    serde_json::from_str::<Value>(line)
        .ok()
        .as_ref()
        .and_then(Value::as_object)
        .is_some_and(|object| object.contains_key("error"))
}

/// Client-side connection to the daemon endpoint.
enum ClientStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl ClientStream {
    fn connect(endpoint: &SocketEndpoint) -> io::Result<Self> {
        match endpoint {
            SocketEndpoint::Tcp { host, port } => {
                TcpStream::connect((host.as_str(), *port)).map(Self::Tcp)
            }
            SocketEndpoint::Unix { path } => {
                #[cfg(unix)]
                {
                    UnixStream::connect(path.as_std_path()).map(Self::Unix)
                }
                #[cfg(not(unix))]
                {
                    Err(io::Error::new(
                        io::ErrorKind::Unsupported,
                        format!("unix endpoint '{path}' is not supported on this platform"),
                    ))
                }
            }
        }
    }

    fn shutdown_write(&self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.shutdown(Shutdown::Write),
            #[cfg(unix)]
            Self::Unix(stream) => stream.shutdown(Shutdown::Write),
        }
    }
}

impl Read for ClientStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for ClientStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

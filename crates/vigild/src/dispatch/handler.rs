//! Connection handler that serves a persistent command session.
//!
//! Each accepted connection becomes one session: the handler determines the
//! peer's trust once, then reads JSONL command arrays in a loop and
//! dispatches every one in daemon mode until the client disconnects. A
//! long-running command blocks only its own session; other sessions run on
//! their own threads.

use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::transport::{ConnectionHandler, ConnectionStream};

use super::dispatcher::{DISPATCH_TARGET, Dispatcher};
use super::errors::DispatchError;
use super::registry::ExecutionMode;
use super::request::CommandRequest;
use super::session::Session;

/// Maximum size of a single request line in bytes.
pub(crate) const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Connection handler that parses and dispatches JSONL command arrays.
#[derive(Debug)]
pub struct SessionConnectionHandler {
    dispatcher: Dispatcher,
    next_session: AtomicU64,
}

impl SessionConnectionHandler {
    /// Creates a handler dispatching through the given dispatcher.
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            next_session: AtomicU64::new(1),
        }
    }

    fn serve(&self, stream: ConnectionStream) {
        let session_id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let is_owner = stream.peer_is_owner();

        let mut write_half = match stream.try_clone() {
            Ok(clone) => clone,
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    session = session_id,
                    %error,
                    "failed to split connection stream"
                );
                return;
            }
        };

        debug!(
            target: DISPATCH_TARGET,
            session = session_id,
            is_owner,
            "session opened"
        );

        let mut session = Session::new(session_id, is_owner, &mut write_half);
        let mut reader = JsonlReader::new(stream);

        loop {
            let line = match reader.next_line() {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(error) => {
                    warn!(
                        target: DISPATCH_TARGET,
                        session = session_id,
                        %error,
                        "failed to read request"
                    );
                    session.send_error(&error);
                    break;
                }
            };

            // Blank lines between commands are tolerated as keep-alive noise.
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let request = match CommandRequest::parse(&line) {
                Ok(request) => request,
                Err(error) => {
                    session.send_error(&error);
                    continue;
                }
            };

            self.dispatcher
                .dispatch(&mut session, &request, Some(ExecutionMode::Daemon));

            if self.dispatcher.server().shutdown_requested() {
                break;
            }
        }

        debug!(
            target: DISPATCH_TARGET,
            session = session_id,
            "session closed"
        );
    }
}

impl ConnectionHandler for SessionConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        self.serve(stream);
    }
}

/// Bounded JSONL line reader with carry-over between commands.
struct JsonlReader {
    stream: ConnectionStream,
    buffer: Vec<u8>,
}

impl JsonlReader {
    fn new(stream: ConnectionStream) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
        }
    }

    /// Reads the next newline-terminated line, retaining any bytes already
    /// read past it for the following call.
    ///
    /// Returns `Ok(None)` once the client disconnects with no pending data;
    /// a final unterminated line is still delivered.
    fn next_line(&mut self) -> Result<Option<Vec<u8>>, DispatchError> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = self.buffer.drain(..=pos).collect();
                return Ok(Some(line));
            }
            enforce_limit(self.buffer.len())?;

            let mut chunk = [0_u8; 1024];
            let bytes_read = read_with_retry(&mut self.stream, &mut chunk)?;
            if bytes_read == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(std::mem::take(&mut self.buffer)));
            }
            self.buffer
                .extend_from_slice(chunk.get(..bytes_read).unwrap_or_default());
        }
    }
}

/// Reads from the stream, retrying on interrupts.
fn read_with_retry(stream: &mut ConnectionStream, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match stream.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Enforces the maximum request size limit.
fn enforce_limit(size: usize) -> Result<(), DispatchError> {
    if size > MAX_REQUEST_BYTES {
        return Err(DispatchError::malformed(format!(
            "request exceeds {MAX_REQUEST_BYTES} byte limit"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};

    use rstest::{fixture, rstest};
    use vigil_config::Config;

    use crate::commands;
    use crate::dispatch::CommandRegistry;
    use crate::server::ServerState;

    use super::*;

    fn dispatcher() -> Dispatcher {
        let mut registry = CommandRegistry::new();
        commands::register_builtins(&mut registry);
        Dispatcher::new(Arc::new(ServerState::new(Config::default(), registry)))
    }

    /// TCP server/client pair driving the session handler.
    struct HandlerHarness {
        client: TcpStream,
        server_handle: JoinHandle<()>,
    }

    impl HandlerHarness {
        /// Sends request bytes, half-closes the connection, and collects all
        /// response lines.
        fn send_and_collect(&mut self, request: &[u8]) -> Vec<String> {
            self.client.write_all(request).expect("write request");
            self.client.flush().expect("flush");
            self.client.shutdown(Shutdown::Write).expect("half-close");

            let mut reader = BufReader::new(&mut self.client);
            let mut lines = Vec::new();
            let mut line = String::new();
            while reader.read_line(&mut line).expect("read") > 0 {
                lines.push(line.clone());
                line.clear();
            }
            lines
        }

        fn join(self) {
            self.server_handle.join().expect("server join");
        }
    }

    fn create_listener() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let addr = listener.local_addr().expect("addr");
        (listener, addr)
    }

    #[fixture]
    fn harness() -> HandlerHarness {
        let (listener, addr) = create_listener();
        let handler = SessionConnectionHandler::new(dispatcher());

        let server_handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            handler.handle(ConnectionStream::Tcp(stream));
        });

        let client = TcpStream::connect(addr).expect("connect");
        HandlerHarness {
            client,
            server_handle,
        }
    }

    #[rstest]
    fn answers_version_requests(mut harness: HandlerHarness) {
        let lines = harness.send_and_collect(b"[\"version\"]\n");
        assert!(lines.iter().any(|l| l.contains(r#""version""#)));
        harness.join();
    }

    #[rstest]
    fn serves_multiple_commands_per_session(mut harness: HandlerHarness) {
        let lines = harness.send_and_collect(b"[\"version\"]\n[\"get-pid\"]\n");
        assert!(lines.iter().any(|l| l.contains(r#""version""#)));
        assert!(lines.iter().any(|l| l.contains(r#""pid""#)));
        harness.join();
    }

    #[rstest]
    fn rejects_malformed_json_and_keeps_serving(mut harness: HandlerHarness) {
        let lines = harness.send_and_collect(b"not json\n[\"version\"]\n");
        assert!(lines.iter().any(|l| l.contains(r#""error""#)));
        assert!(lines.iter().any(|l| l.contains(r#""version""#)));
        harness.join();
    }

    #[rstest]
    fn rejects_unknown_commands(mut harness: HandlerHarness) {
        let lines = harness.send_and_collect(b"[\"nope\"]\n");
        assert!(lines.iter().any(|l| l.contains("unknown command nope")));
        harness.join();
    }

    #[rstest]
    fn tcp_peers_are_not_owners(mut harness: HandlerHarness) {
        // `watch` is owner-only and TCP peers carry no credentials.
        let lines = harness.send_and_collect(b"[\"watch\", \"/tmp\"]\n");
        assert!(lines.iter().any(|l| l.contains("process owner")));
        harness.join();
    }
}

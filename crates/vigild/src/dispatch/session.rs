//! Per-client session context for command dispatch.
//!
//! A session owns its response stream and trust flag exclusively; no state
//! here is shared across sessions. While a command is in flight the session
//! keeps a reference to it so concurrently-produced diagnostic logs can show
//! what the session was running; the reference is cleared by an RAII guard
//! on every dispatch exit path.

use std::io::Write;

use serde_json::Value;
use tracing::warn;

use super::errors::DispatchError;
use super::request::CommandRequest;
use super::response::{DAEMON_VERSION, ErrorEnvelope, ResponseWriter};

/// Tracing target for session response plumbing.
const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// One client's connection context.
pub struct Session<'s> {
    id: u64,
    is_owner: bool,
    writer: ResponseWriter<&'s mut dyn Write>,
    current_command: Option<CommandRequest>,
}

impl<'s> Session<'s> {
    /// Creates a session writing responses to `sink`.
    ///
    /// `is_owner` records whether the connected peer is the daemon's trusted
    /// owner; it never changes for the lifetime of the session.
    pub fn new(id: u64, is_owner: bool, sink: &'s mut dyn Write) -> Self {
        Self {
            id,
            is_owner,
            writer: ResponseWriter::new(sink),
            current_command: None,
        }
    }

    /// Session identifier used in diagnostics.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the connected peer is the daemon's trusted owner.
    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    /// The command currently being dispatched on this session, if any.
    #[must_use]
    pub fn current_command(&self) -> Option<&CommandRequest> {
        self.current_command.as_ref()
    }

    /// Sends a success payload, stamping the daemon version when the payload
    /// does not already carry one.
    ///
    /// Write failures are logged and swallowed; a client that has gone away
    /// must not take the daemon down with it.
    pub fn send_response(&mut self, payload: Value) {
        let mut payload = payload;
        if let Value::Object(map) = &mut payload {
            map.entry("version")
                .or_insert_with(|| Value::String(DAEMON_VERSION.to_string()));
        }
        self.write_value(&payload);
    }

    /// Sends a structured error envelope for a dispatch rejection.
    ///
    /// Write failures are logged and swallowed, as for [`Self::send_response`].
    pub fn send_error(&mut self, error: &DispatchError) {
        self.send_envelope(ErrorEnvelope::dispatch(error));
    }

    /// Sends an error envelope with a handler-supplied message, for argument
    /// problems a handler detects itself.
    pub fn send_error_message(&mut self, message: impl Into<String>) {
        self.send_envelope(ErrorEnvelope {
            error: message.into(),
            version: DAEMON_VERSION.to_string(),
            cli_validated: false,
        });
    }

    fn send_envelope(&mut self, envelope: ErrorEnvelope) {
        match serde_json::to_value(&envelope) {
            Ok(value) => self.write_value(&value),
            Err(serialise_error) => warn!(
                target: SESSION_TARGET,
                session = self.id,
                error = %serialise_error,
                "failed to serialise error envelope"
            ),
        }
    }

    fn write_value(&mut self, value: &Value) {
        if let Err(error) = self.writer.write_value(value) {
            warn!(
                target: SESSION_TARGET,
                session = self.id,
                error = %error,
                "failed to write response to session"
            );
        }
    }
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Session")
            .field("id", &self.id)
            .field("is_owner", &self.is_owner)
            .field("current_command", &self.current_command)
            .finish()
    }
}

/// Guard that pins the in-flight command on a session for the duration of a
/// dispatch and clears it when dropped.
///
/// Dropping on every exit path, rejection and success alike, is what keeps
/// the session's diagnostic state symmetric.
pub(crate) struct InFlightCommand<'g, 's> {
    session: &'g mut Session<'s>,
}

impl<'g, 's> InFlightCommand<'g, 's> {
    /// Records `request` as in flight on `session`.
    pub(crate) fn begin(session: &'g mut Session<'s>, request: CommandRequest) -> Self {
        session.current_command = Some(request);
        Self { session }
    }

    /// The guarded session.
    pub(crate) fn session(&mut self) -> &mut Session<'s> {
        self.session
    }
}

impl Drop for InFlightCommand<'_, '_> {
    fn drop(&mut self) {
        self.session.current_command = None;
    }
}

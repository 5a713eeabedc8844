//! Response serialisation for sessions and the CLI bootstrap path.
//!
//! Responses are single JSON objects framed as JSONL. Every payload carries
//! a `version` field so clients can log which daemon answered; rejections
//! use the error envelope, whose `cli_validated` flag records which
//! validation stage produced it.

use std::io::Write;

use serde::Serialize;
use serde_json::Value;

use super::errors::DispatchError;

/// Version string stamped into every response.
pub const DAEMON_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Structured error envelope returned for rejected commands.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    /// Human-readable description of the failure.
    pub error: String,
    /// Daemon version that produced the envelope.
    pub version: String,
    /// Whether the failure came from the pre-session CLI validation stage.
    pub cli_validated: bool,
}

impl ErrorEnvelope {
    /// Envelope for a per-session dispatch rejection.
    #[must_use]
    pub fn dispatch(error: &DispatchError) -> Self {
        Self {
            error: error.to_string(),
            version: DAEMON_VERSION.to_string(),
            cli_validated: false,
        }
    }

    /// Envelope for a CLI bootstrap validation failure.
    #[must_use]
    pub fn cli(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            version: DAEMON_VERSION.to_string(),
            cli_validated: true,
        }
    }
}

/// Serialisation selected by the caller for bootstrap-path output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputEncoding {
    /// Compact single-line JSON.
    #[default]
    Json,
    /// Indented JSON for interactive terminals.
    JsonPretty,
}

impl OutputEncoding {
    /// Writes a payload in this encoding followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error when serialisation or the underlying write fails.
    pub fn write_payload<T: Serialize>(
        self,
        output: &mut dyn Write,
        payload: &T,
    ) -> Result<(), DispatchError> {
        match self {
            Self::Json => serde_json::to_writer(&mut *output, payload)?,
            Self::JsonPretty => serde_json::to_writer_pretty(&mut *output, payload)?,
        }
        output.write_all(b"\n")?;
        output.flush()?;
        Ok(())
    }
}

/// Writes JSONL response lines to a session's output stream.
#[derive(Debug)]
pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    /// Wraps an output stream.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes one response value as a JSONL line and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error when serialisation or writing fails.
    pub fn write_value(&mut self, value: &Value) -> Result<(), DispatchError> {
        serde_json::to_writer(&mut self.writer, value)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dispatch_envelope_is_not_cli_validated() {
        let envelope = ErrorEnvelope::dispatch(&DispatchError::unknown_command("nope"));
        assert!(!envelope.cli_validated);
        assert!(envelope.error.contains("nope"));
        assert_eq!(envelope.version, DAEMON_VERSION);
    }

    #[test]
    fn cli_envelope_sets_the_stage_flag() {
        let envelope = ErrorEnvelope::cli("wrong number of arguments");
        assert!(envelope.cli_validated);
    }

    #[test]
    fn compact_encoding_emits_one_line() {
        let mut output = Vec::new();
        OutputEncoding::Json
            .write_payload(&mut output, &ErrorEnvelope::cli("bad"))
            .expect("write");
        let text = String::from_utf8(output).expect("utf8");
        assert_eq!(text.matches('\n').count(), 1);
        assert!(text.contains(r#""cli_validated":true"#));
    }

    #[test]
    fn pretty_encoding_indents() {
        let mut output = Vec::new();
        OutputEncoding::JsonPretty
            .write_payload(&mut output, &ErrorEnvelope::cli("bad"))
            .expect("write");
        let text = String::from_utf8(output).expect("utf8");
        assert!(text.matches('\n').count() > 1);
    }

    #[test]
    fn response_writer_frames_jsonl() {
        let mut output = Vec::new();
        let mut writer = ResponseWriter::new(&mut output);
        writer
            .write_value(&json!({"version": "0.1.0"}))
            .expect("write");
        let text = String::from_utf8(output).expect("utf8");
        assert!(text.ends_with('\n'));
        assert!(text.contains(r#""version":"0.1.0""#));
    }
}

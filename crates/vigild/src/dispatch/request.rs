//! Command request parsing for the dispatch pipeline.
//!
//! A command arrives as one JSONL line holding a single ordered array:
//! element 0 names the command and the remaining elements are
//! command-specific values the dispatcher treats as opaque. The payload is
//! shared behind an `Arc` so a session can cheaply stash the in-flight
//! command for diagnostic logging while the dispatcher works with it.

use std::sync::Arc;

use serde_json::Value;

use super::errors::DispatchError;

/// A parsed command array.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    args: Arc<[Value]>,
}

impl CommandRequest {
    /// Parses a JSONL line into a command request.
    ///
    /// Trailing whitespace (including the newline delimiter) is trimmed
    /// before parsing. The line must contain a JSON array; element counts
    /// and types beyond that are checked during lookup, not here.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MalformedCommand`] when the line is empty,
    /// is not valid JSON, or is valid JSON of a non-array type.
    pub fn parse(line: &[u8]) -> Result<Self, DispatchError> {
        let trimmed = trim_trailing_whitespace(line);
        if trimmed.is_empty() {
            return Err(DispatchError::malformed("empty request line"));
        }

        let value: Value = serde_json::from_slice(trimmed)
            .map_err(|error| DispatchError::malformed(error.to_string()))?;
        match value {
            Value::Array(args) => Ok(Self::from_values(args)),
            other => Err(DispatchError::malformed(format!(
                "expected a command array, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Builds a request from already-parsed values.
    #[must_use]
    pub fn from_values(args: Vec<Value>) -> Self {
        Self { args: args.into() }
    }

    /// The full ordered argument array, command name included.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// The command name, when element 0 exists and is a string.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.args.first().and_then(Value::as_str)
    }

    /// Returns whether the argument array is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

/// Trims trailing ASCII whitespace from a byte slice.
fn trim_trailing_whitespace(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |pos| pos + 1);
    bytes.get(..end).unwrap_or_default()
}

/// Human-readable JSON type name for malformed-request messages.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

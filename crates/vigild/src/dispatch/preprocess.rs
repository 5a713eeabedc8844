//! Pre-session validation for commands supplied on the CLI bootstrap path.
//!
//! Before any session exists there is nowhere to report a bad command back
//! to, so this path fails fast: a validation error is serialised as an
//! error envelope on the process's standard output and the binary exits
//! non-zero. Unknown commands pass through untouched; a client older or
//! newer than the daemon must not hard-fail on names it does not know.

use std::io::Write;

use thiserror::Error;

use super::dispatcher::lookup_command;
use super::errors::DispatchError;
use super::registry::CommandRegistry;
use super::request::CommandRequest;
use super::response::{ErrorEnvelope, OutputEncoding};

/// Errors raised by the bootstrap validation pass.
#[derive(Debug, Error)]
pub enum PreprocessError {
    /// The command failed validation; the envelope has already been written.
    #[error("{message}")]
    Validation {
        /// Message carried by the emitted envelope.
        message: String,
    },
    /// Writing the error envelope itself failed.
    #[error("failed to write validation error: {0}")]
    Output(#[from] DispatchError),
}

/// Validates a command before any session exists.
///
/// The command is resolved tolerantly (unknown names return `Ok` so they can
/// be forwarded to a possibly-newer daemon). When the resolved definition
/// carries a validator, it runs here; any produced error is serialised as a
/// `cli_validated` envelope to `output` in the caller-selected encoding.
/// The caller is expected to terminate the process on `Err`.
///
/// # Errors
///
/// Returns [`PreprocessError::Validation`] after writing the envelope, or
/// [`PreprocessError::Output`] when the envelope itself cannot be written.
pub fn preprocess(
    registry: &CommandRegistry,
    request: &CommandRequest,
    encoding: OutputEncoding,
    output: &mut dyn Write,
) -> Result<(), PreprocessError> {
    let definition = match lookup_command(registry, request, None) {
        Ok(Some(definition)) => definition,
        // Nothing known about the command; pass it on for forward
        // compatibility.
        Ok(None) => return Ok(()),
        Err(error) => return fail(encoding, output, error.to_string()),
    };

    if let Some(validator) = definition.validator()
        && let Err(error) = validator(request.args())
    {
        return fail(encoding, output, error.message);
    }

    Ok(())
}

fn fail(
    encoding: OutputEncoding,
    output: &mut dyn Write,
    message: String,
) -> Result<(), PreprocessError> {
    let envelope = ErrorEnvelope::cli(message.clone());
    encoding.write_payload(output, &envelope)?;
    Err(PreprocessError::Validation { message })
}

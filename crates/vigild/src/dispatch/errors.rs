//! Error types for command dispatch failures.
//!
//! Each variant maps to one rejection path in the dispatch pipeline. All of
//! them are surfaced to the originating session as structured error
//! responses; none of them abort the daemon.

use std::io;

use thiserror::Error;

/// Errors surfaced while validating, authorising, or answering a command.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request was not a usable command array.
    #[error("invalid command: {message}")]
    MalformedCommand {
        /// Description of the structural problem.
        message: String,
    },

    /// The command name is not registered and strict lookup was requested.
    #[error("unknown command {name}")]
    UnknownCommand {
        /// Name the client asked for.
        name: String,
    },

    /// The command exists but is not available in the requested mode.
    #[error("command {name} not available in this mode")]
    ModeViolation {
        /// Name of the resolved command.
        name: String,
    },

    /// The daemon has poisoned itself and the command is not immune.
    #[error("{reason}")]
    Poisoned {
        /// Reason recorded when the daemon was poisoned.
        reason: String,
    },

    /// The calling session is not the daemon owner.
    #[error("you must be the process owner to execute '{name}'")]
    PermissionDenied {
        /// Name of the command that was refused.
        name: String,
    },

    /// Writing a response to the session failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A response payload could not be serialised.
    #[error("failed to serialise response: {0}")]
    SerialiseResponse(#[from] serde_json::Error),
}

impl DispatchError {
    /// Creates a malformed command error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedCommand {
            message: message.into(),
        }
    }

    /// Creates an unknown command error.
    pub fn unknown_command(name: impl Into<String>) -> Self {
        Self::UnknownCommand { name: name.into() }
    }

    /// Creates a mode violation error.
    pub fn mode_violation(name: impl Into<String>) -> Self {
        Self::ModeViolation { name: name.into() }
    }

    /// Creates a poisoned error carrying the recorded reason.
    pub fn poisoned(reason: impl Into<String>) -> Self {
        Self::Poisoned {
            reason: reason.into(),
        }
    }

    /// Creates a permission denied error.
    pub fn permission_denied(name: impl Into<String>) -> Self {
        Self::PermissionDenied { name: name.into() }
    }
}

/// Error produced by a command's argument validator.
///
/// Validators run on the CLI bootstrap path before any session exists; the
/// message is what ends up in the fail-fast error envelope.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ArgumentError {
    /// Human-readable description of the argument problem.
    pub message: String,
}

impl ArgumentError {
    /// Creates an argument error from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

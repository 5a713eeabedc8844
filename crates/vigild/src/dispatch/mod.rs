//! Command registry, capability negotiation, and the dispatch pipeline.
//!
//! This module is the chokepoint every client request passes through. A
//! command arrives as an ordered JSON array whose first element names the
//! command:
//!
//! ```json
//! ["watch", "/var/log"]
//! ```
//!
//! The dispatcher resolves the name against the [`CommandRegistry`], applies
//! mode, poison, and ownership policy, then runs the handler under a scoped
//! performance sample. Rejections are answered with the error envelope:
//!
//! ```json
//! {"error":"unknown command nope","version":"0.1.0","cli_validated":false}
//! ```
//!
//! Registration also derives one capability per command (`cmd-<name>`) so
//! clients negotiate features by probing names instead of comparing version
//! strings.

mod capability;
mod dispatcher;
mod errors;
mod handler;
mod perf;
mod poison;
mod preprocess;
mod registry;
mod request;
mod response;
mod session;

pub use self::capability::CapabilitySet;
pub use self::dispatcher::{Dispatcher, lookup_command};
pub use self::errors::{ArgumentError, DispatchError};
pub use self::handler::SessionConnectionHandler;
pub use self::perf::PerfSample;
pub use self::poison::PoisonState;
pub use self::preprocess::{PreprocessError, preprocess};
pub use self::registry::{
    CommandDefinition, CommandFlags, CommandHandler, CommandRegistry, CommandValidator,
    ExecutionMode,
};
pub use self::request::CommandRequest;
pub use self::response::{DAEMON_VERSION, ErrorEnvelope, OutputEncoding, ResponseWriter};
pub use self::session::Session;

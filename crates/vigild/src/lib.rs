//! Request-dispatch core of the vigil file-watching daemon.
//!
//! The daemon serves many concurrent client sessions over a JSONL
//! request/response protocol. Every request passes through one pipeline: the
//! command registry resolves the name, mode and permission policy gate the
//! execution, and the handler runs under a scoped performance sample. The
//! process-wide poison state lets the daemon degrade gracefully, refusing
//! poison-sensitive commands with a recorded reason instead of corrupting
//! state, until it is restarted.
//!
//! The `vigild` binary is dual-role: invoked bare it serves as the daemon;
//! invoked with a command (`vigild watch /var/log`) it validates the command
//! pre-session, runs CLI-capable commands in-process, and forwards the rest
//! to the daemon socket.
//!
//! Registered commands advertise `cmd-<name>` capabilities so clients probe
//! for features by name rather than comparing version strings.

mod bootstrap;
mod cli;
mod client;
mod commands;
pub mod dispatch;
mod health;
mod process;
mod server;
pub mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use cli::run;
pub use commands::register_builtins;
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{LaunchError, run_daemon};
pub use server::ServerState;
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{
    ConnectionHandler, ConnectionStream, ListenerError, ListenerHandle, SocketListener,
};

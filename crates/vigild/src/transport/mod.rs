//! Socket transport for daemon sessions.
//!
//! Binds the configured endpoint, accepts connections on a background
//! thread, and hands each one to a [`ConnectionHandler`] on its own thread.

mod errors;
mod handler;
mod listener;

pub use self::errors::ListenerError;
#[cfg(test)]
pub(crate) use self::handler::NoopConnectionHandler;
pub use self::handler::{ConnectionHandler, ConnectionStream};
pub use self::listener::{ListenerHandle, SocketListener};

pub(crate) const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

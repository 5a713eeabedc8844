//! Error types for socket binding and the accept loop.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors raised while binding or running a socket listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Resolving the TCP host failed.
    #[error("failed to resolve {host}:{port}: {source}")]
    Resolve {
        /// Configured host name.
        host: String,
        /// Configured port.
        port: u16,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },

    /// The TCP host resolved to no usable address.
    #[error("{host}:{port} resolved to no addresses")]
    ResolveEmpty {
        /// Configured host name.
        host: String,
        /// Configured port.
        port: u16,
    },

    /// Binding the TCP listener failed.
    #[error("failed to bind {addr}: {source}")]
    BindTcp {
        /// Address that could not be bound.
        addr: SocketAddr,
        /// Underlying bind error.
        #[source]
        source: io::Error,
    },

    /// Binding the Unix listener failed.
    #[error("failed to bind unix socket '{path}': {source}")]
    BindUnix {
        /// Socket path that could not be bound.
        path: String,
        /// Underlying bind error.
        #[source]
        source: io::Error,
    },

    /// The configured Unix socket path exists but is not a socket.
    #[error("'{path}' exists and is not a socket")]
    UnixNotSocket {
        /// Offending filesystem path.
        path: String,
    },

    /// Another daemon is already serving on the Unix socket.
    #[error("unix socket '{path}' is already in use")]
    UnixInUse {
        /// Socket path another process holds.
        path: String,
    },

    /// Inspecting an existing socket path failed.
    #[error("failed to inspect '{path}': {source}")]
    UnixMetadata {
        /// Socket path being inspected.
        path: String,
        /// Underlying filesystem error.
        #[source]
        source: io::Error,
    },

    /// Probing an existing socket for liveness failed.
    #[error("failed to probe stale socket '{path}': {source}")]
    UnixProbe {
        /// Socket path being probed.
        path: String,
        /// Underlying connect error.
        #[source]
        source: io::Error,
    },

    /// Removing a stale socket file failed.
    #[error("failed to remove stale socket '{path}': {source}")]
    UnixCleanup {
        /// Stale socket path.
        path: String,
        /// Underlying filesystem error.
        #[source]
        source: io::Error,
    },

    /// Unix endpoints are not available on this platform.
    #[error("unix socket endpoint '{endpoint}' is not supported on this platform")]
    UnsupportedUnix {
        /// Configured endpoint.
        endpoint: String,
    },

    /// Switching the listener to non-blocking mode failed.
    #[error("failed to configure non-blocking accept: {source}")]
    NonBlocking {
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// The accept-loop thread panicked.
    #[error("listener thread panicked")]
    ThreadPanic,
}

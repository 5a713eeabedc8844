//! Daemon runtime: serve until a shutdown is requested.
//!
//! The daemon runs in the foreground; service managers own daemonisation.
//! Shutdown is cooperative: termination signals and the `shutdown-server`
//! command both set the shared flag the serve loop polls.

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::bootstrap::{BootstrapError, ConfigLoader, bootstrap_with};
use crate::dispatch::SessionConnectionHandler;
use crate::health::HealthReporter;
use crate::server::ServerState;
use crate::transport::{ListenerError, SocketListener};

/// Tracing target for process lifecycle events.
const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

/// Interval at which the serve loop polls the shutdown flag.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Errors surfaced while launching or running the daemon.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrap failed before serving started.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// The listener could not be bound or torn down.
    #[error(transparent)]
    Listener(#[from] ListenerError),
    /// Registering termination signal handlers failed.
    #[error("failed to register signal handler: {source}")]
    Signal {
        /// Underlying registration error.
        #[source]
        source: io::Error,
    },
}

/// Bootstraps and serves the daemon until shutdown.
///
/// # Errors
///
/// Returns a [`LaunchError`] when bootstrap, signal registration, or the
/// listener fails; a clean shutdown returns `Ok`.
pub fn run_daemon(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<(), LaunchError> {
    let daemon = bootstrap_with(loader, reporter)?;
    let server = Arc::clone(daemon.server());

    register_shutdown_signals(&server)?;

    let listener = SocketListener::bind(daemon.config().daemon_socket())?;
    let handler = Arc::new(SessionConnectionHandler::new(daemon.dispatcher()));
    let handle = listener.start(handler)?;
    daemon.reporter().serving(daemon.config().daemon_socket());

    while !server.shutdown_requested() {
        thread::sleep(SHUTDOWN_POLL_INTERVAL);
    }

    daemon.reporter().shutdown_requested();
    info!(target: PROCESS_TARGET, "stopping listener");
    handle.shutdown();
    handle.join()?;
    Ok(())
}

fn register_shutdown_signals(server: &ServerState) -> Result<(), LaunchError> {
    for signal in signal_hook::consts::TERM_SIGNALS {
        signal_hook::flag::register(*signal, server.shutdown_handle())
            .map(|_| ())
            .map_err(|source| LaunchError::Signal { source })?;
    }
    Ok(())
}

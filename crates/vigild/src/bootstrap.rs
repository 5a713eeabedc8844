//! Daemon bootstrap orchestration.
//!
//! Bootstrap runs before any session exists: load configuration, initialise
//! telemetry, prepare the socket filesystem, and build the command registry.
//! Each stage reports through [`HealthReporter`] so operators can diagnose a
//! failed start from structured logs alone.

use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use vigil_config::{Config, SocketPreparationError};

use crate::commands;
use crate::dispatch::{CommandRegistry, Dispatcher};
use crate::health::HealthReporter;
use crate::server::ServerState;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    ///
    /// # Errors
    ///
    /// Returns the underlying loader error when the configuration cannot be
    /// resolved.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that returns an already-resolved configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps a resolved configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Socket preparation failed.
    #[error("failed to prepare daemon socket: {source}")]
    Socket {
        /// Filesystem error reported while preparing the socket directory.
        #[source]
        source: SocketPreparationError,
    },
}

/// Result of a successful bootstrap invocation.
pub struct Daemon {
    server: Arc<ServerState>,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl Daemon {
    fn new(
        server: Arc<ServerState>,
        telemetry: TelemetryHandle,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        Self {
            server,
            telemetry,
            reporter,
        }
    }

    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        self.server.config()
    }

    /// Accessor for the shared daemon state.
    #[must_use]
    pub fn server(&self) -> &Arc<ServerState> {
        &self.server
    }

    /// Accessor for the health reporter.
    #[must_use]
    pub fn reporter(&self) -> &Arc<dyn HealthReporter> {
        &self.reporter
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Builds a dispatcher over this daemon's state.
    #[must_use]
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(Arc::clone(&self.server))
    }
}

/// Bootstraps the daemon using the supplied collaborators.
///
/// # Errors
///
/// Returns a [`BootstrapError`] naming the stage that failed; the same error
/// is also reported through `reporter`.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let telemetry = match telemetry::initialise(&config) {
        Ok(handle) => handle,
        Err(source) => {
            let error = BootstrapError::Telemetry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    if let Err(source) = config.daemon_socket().prepare_filesystem() {
        let error = BootstrapError::Socket { source };
        reporter.bootstrap_failed(&error);
        return Err(error);
    }

    let mut registry = CommandRegistry::new();
    commands::register_builtins(&mut registry);

    let server = Arc::new(ServerState::new(config.clone(), registry));
    reporter.bootstrap_succeeded(&config);

    Ok(Daemon::new(server, telemetry, reporter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use vigil_config::SocketEndpoint;

    #[derive(Default)]
    struct RecordingReporter {
        events: Mutex<Vec<String>>,
    }

    impl RecordingReporter {
        fn record(&self, event: &str) {
            self.events
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(event.to_string());
        }

        fn events(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone()
        }
    }

    impl HealthReporter for RecordingReporter {
        fn bootstrap_starting(&self) {
            self.record("starting");
        }

        fn bootstrap_succeeded(&self, _config: &Config) {
            self.record("succeeded");
        }

        fn bootstrap_failed(&self, _error: &BootstrapError) {
            self.record("failed");
        }

        fn serving(&self, _endpoint: &SocketEndpoint) {
            self.record("serving");
        }

        fn shutdown_requested(&self) {
            self.record("shutdown");
        }
    }

    fn test_config() -> Config {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("vigil").join("vigild.sock");
        // Leak the directory so the socket path stays usable for the test's
        // duration.
        std::mem::forget(dir);
        let mut config = Config::default();
        config.daemon_socket =
            SocketEndpoint::unix(path.to_str().expect("utf8 path").to_string());
        config
    }

    #[test]
    fn bootstrap_reports_stage_progression() {
        let reporter = Arc::new(RecordingReporter::default());
        let loader = StaticConfigLoader::new(test_config());
        let daemon = bootstrap_with(&loader, Arc::<RecordingReporter>::clone(&reporter))
            .expect("bootstrap");
        assert_eq!(reporter.events(), vec!["starting", "succeeded"]);
        assert!(
            daemon
                .server()
                .registry()
                .capabilities()
                .supported("cmd-version")
        );
    }

    #[test]
    fn bootstrap_builds_a_working_dispatcher() {
        let reporter = Arc::new(RecordingReporter::default());
        let loader = StaticConfigLoader::new(test_config());
        let daemon =
            bootstrap_with(&loader, Arc::<RecordingReporter>::clone(&reporter)).expect("bootstrap");
        let dispatcher = daemon.dispatcher();
        assert!(dispatcher.server().registry().lookup("watch").is_some());
    }
}

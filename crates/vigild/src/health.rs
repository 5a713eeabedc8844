//! Structured health reporting for daemon lifecycle events.

use std::sync::Arc;

use crate::bootstrap::BootstrapError;

use vigil_config::{Config, SocketEndpoint};

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the listener is accepting sessions.
    fn serving(&self, endpoint: &SocketEndpoint);

    /// Invoked when a shutdown has been requested.
    fn shutdown_requested(&self);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn serving(&self, endpoint: &SocketEndpoint) {
        (**self).serving(endpoint);
    }

    fn shutdown_requested(&self) {
        (**self).shutdown_requested();
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: "vigild::health",
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: "vigild::health",
            event = "bootstrap_succeeded",
            socket = %config.daemon_socket(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            slow_command_threshold_ms = config.slow_command_threshold_ms,
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: "vigild::health",
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn serving(&self, endpoint: &SocketEndpoint) {
        tracing::info!(
            target: "vigild::health",
            event = "serving",
            endpoint = %endpoint,
            "daemon accepting sessions"
        );
    }

    fn shutdown_requested(&self) {
        tracing::info!(
            target: "vigild::health",
            event = "shutdown_requested",
            "daemon shutting down"
        );
    }
}

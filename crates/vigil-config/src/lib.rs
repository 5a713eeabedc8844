//! Shared configuration for the vigil daemon and its CLI bootstrap path.
//!
//! Both roles of the `vigild` binary resolve the same [`Config`], merged from
//! four layers in descending precedence: command-line flags, `VIGIL_`-prefixed
//! environment variables, an optional TOML configuration file, and built-in
//! defaults. The daemon socket, logging filter and format, and the
//! slow-command threshold all live here so the serving loop and the one-shot
//! client agree on where the daemon lives and how it reports.

mod defaults;
mod logging;
mod socket;

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_SLOW_COMMAND_THRESHOLD_MS, DEFAULT_TCP_PORT, default_log_filter,
    default_log_filter_string, default_log_format, default_slow_command_threshold_ms,
    default_socket_endpoint,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved configuration shared by the daemon and the CLI bootstrap path.
#[derive(Debug, Clone, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "VIGIL")]
pub struct Config {
    /// Endpoint the daemon listens on and clients connect to.
    #[serde(default = "defaults::default_socket_endpoint")]
    pub daemon_socket: SocketEndpoint,
    /// Tracing filter expression applied to the global subscriber.
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Output format for structured logs.
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
    /// Wall-clock threshold, in milliseconds, above which a dispatched
    /// command is sampled into the operational log.
    #[serde(default = "defaults::default_slow_command_threshold_ms")]
    pub slow_command_threshold_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_socket: defaults::default_socket_endpoint(),
            log_filter: defaults::default_log_filter_string(),
            log_format: defaults::default_log_format(),
            slow_command_threshold_ms: defaults::default_slow_command_threshold_ms(),
        }
    }
}

impl Config {
    /// Loads the configuration from process arguments, the environment, and
    /// any configuration file named by `--config-path`.
    ///
    /// # Errors
    ///
    /// Returns the underlying loader error when any layer fails to parse or
    /// merge.
    pub fn load() -> Result<Self, Arc<OrthoError>> {
        <Self as OrthoConfig>::load()
    }

    /// Loads the configuration from an explicit argument iterator.
    ///
    /// The first item is treated as the program name, mirroring
    /// `std::env::args_os`.
    ///
    /// # Errors
    ///
    /// Returns the underlying loader error when any layer fails to parse or
    /// merge.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Accessor for the daemon socket endpoint.
    #[must_use]
    pub fn daemon_socket(&self) -> &SocketEndpoint {
        &self.daemon_socket
    }

    /// Accessor for the tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Accessor for the logging output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// The slow-command threshold as a [`Duration`].
    #[must_use]
    pub fn slow_command_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_command_threshold_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        let config = Config::default();
        assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
        assert_eq!(config.log_format(), LogFormat::Json);
        assert_eq!(
            config.slow_command_threshold(),
            Duration::from_millis(DEFAULT_SLOW_COMMAND_THRESHOLD_MS)
        );
        assert_eq!(config.daemon_socket(), &default_socket_endpoint());
    }

    #[test]
    fn cli_flag_overrides_default_socket() {
        let config = Config::load_from_iter([
            "vigild",
            "--daemon-socket",
            "tcp://127.0.0.1:9001",
        ])
        .expect("load");
        assert_eq!(
            config.daemon_socket(),
            &SocketEndpoint::tcp("127.0.0.1", 9001)
        );
    }

    #[test]
    fn threshold_converts_to_duration() {
        let config = Config::load_from_iter([
            "vigild",
            "--slow-command-threshold-ms",
            "250",
        ])
        .expect("load");
        assert_eq!(config.slow_command_threshold(), Duration::from_millis(250));
    }
}

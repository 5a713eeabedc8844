//! Scoped wall-clock sampling for dispatched commands.
//!
//! Every execution opens a sample named after the command. Samples that run
//! past the configured threshold are emitted to the operational log together
//! with any attached metadata (the original command arguments); fast
//! commands leave only a debug-level trace. Sampling is observational; it
//! never aborts a running handler.

use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Tracing target for performance samples.
const PERF_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::perf");

/// A wall-clock sample covering one handler execution.
#[derive(Debug)]
pub struct PerfSample {
    name: String,
    started: Instant,
    threshold: Duration,
    meta: Map<String, Value>,
}

impl PerfSample {
    /// Opens a sample with the given slow-command threshold.
    #[must_use]
    pub fn new(name: impl Into<String>, threshold: Duration) -> Self {
        Self {
            name: name.into(),
            started: Instant::now(),
            threshold,
            meta: Map::new(),
        }
    }

    /// Attaches contextual metadata emitted with a slow sample.
    pub fn add_meta(&mut self, key: impl Into<String>, value: Value) {
        self.meta.insert(key.into(), value);
    }

    /// Wall-clock time elapsed since the sample was opened.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Returns whether the sample crossed the slow threshold.
    #[must_use]
    pub fn finish(&self) -> bool {
        self.elapsed() > self.threshold
    }

    /// Emits the sample to the operational log.
    pub fn log(&self) {
        let elapsed = self.elapsed();
        let meta = Value::Object(self.meta.clone());
        warn!(
            target: PERF_TARGET,
            sample = %self.name,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            threshold_ms = u64::try_from(self.threshold.as_millis()).unwrap_or(u64::MAX),
            meta = %meta,
            "slow command"
        );
    }

    /// Logs completion at diagnostic verbosity without emitting a sample
    /// record.
    pub fn log_completed(&self) {
        debug!(
            target: PERF_TARGET,
            sample = %self.name,
            "completed"
        );
    }
}

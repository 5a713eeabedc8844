//! Process-wide fail-safe state for unrecoverable internal errors.
//!
//! Some error conditions leave the daemon unable to guarantee that it is
//! operating correctly. Rather than suffering in silence and misleading
//! clients, the daemon poisons itself: poison-sensitive commands are refused
//! with the recorded reason until the process restarts. Poisoning is
//! monotonic; the state only ever transitions healthy to poisoned.

use once_cell::sync::OnceCell;
use tracing::warn;

/// Tracing target for poison-state transitions.
const POISON_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::poison");

/// Write-once fail-safe flag with a human-readable reason.
///
/// One logical writer (the daemon's error-detection paths) races against
/// many readers (every dispatch). Reads are lock-free and cheap; a write
/// becomes visible to readers through the cell's own synchronisation.
#[derive(Debug, Default)]
pub struct PoisonState {
    reason: OnceCell<String>,
}

impl PoisonState {
    /// Creates a healthy poison state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Poisons the daemon with the given reason.
    ///
    /// The first poisoning wins; later calls are no-ops and return `false`.
    /// A dropped later reason is still logged so it is not lost entirely.
    pub fn poison(&self, reason: impl Into<String>) -> bool {
        match self.reason.set(reason.into()) {
            Ok(()) => {
                warn!(
                    target: POISON_TARGET,
                    reason = self.reason.get().map_or("", String::as_str),
                    "daemon poisoned"
                );
                true
            }
            Err(dropped) => {
                warn!(
                    target: POISON_TARGET,
                    dropped = %dropped,
                    retained = self.reason.get().map_or("", String::as_str),
                    "daemon already poisoned; later reason dropped"
                );
                false
            }
        }
    }

    /// Returns the recorded poison reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.get().map(String::as_str)
    }

    /// Returns whether the daemon has been poisoned.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.reason.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_healthy() {
        let state = PoisonState::new();
        assert!(!state.is_poisoned());
        assert_eq!(state.reason(), None);
    }

    #[test]
    fn first_poisoning_wins() {
        let state = PoisonState::new();
        assert!(state.poison("disk full"));
        assert!(!state.poison("watch overflow"));
        assert_eq!(state.reason(), Some("disk full"));
    }

    #[test]
    fn poisoning_is_visible_across_threads() {
        let state = std::sync::Arc::new(PoisonState::new());
        let writer = std::sync::Arc::clone(&state);
        std::thread::spawn(move || {
            writer.poison("inotify watch limit reached");
        })
        .join()
        .expect("poison thread");
        assert_eq!(state.reason(), Some("inotify watch limit reached"));
    }
}

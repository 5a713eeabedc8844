//! Shared daemon state constructed once before serving starts.
//!
//! The registry and capability set are read-only after bootstrap; the poison
//! state is write-once; the watch-root set and shutdown flag are the only
//! live mutable state, guarded so no lock is ever held while a command
//! handler executes.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};

use crate::dispatch::{CommandRegistry, PoisonState};
use vigil_config::Config;

/// Process-wide daemon state shared by every session.
#[derive(Debug)]
pub struct ServerState {
    config: Config,
    registry: CommandRegistry,
    poison: PoisonState,
    watches: Mutex<BTreeSet<Utf8PathBuf>>,
    shutdown: Arc<AtomicBool>,
}

impl ServerState {
    /// Creates the daemon state from its resolved configuration and a fully
    /// populated registry.
    #[must_use]
    pub fn new(config: Config, registry: CommandRegistry) -> Self {
        Self {
            config,
            registry,
            poison: PoisonState::new(),
            watches: Mutex::new(BTreeSet::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The resolved daemon configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The command registry, read-only once serving has started.
    #[must_use]
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// The process-wide poison state.
    #[must_use]
    pub fn poison(&self) -> &PoisonState {
        &self.poison
    }

    /// Records a watched root. Returns `false` when the root was already
    /// watched.
    pub fn add_watch(&self, root: Utf8PathBuf) -> bool {
        self.watches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(root)
    }

    /// Removes a watched root. Returns `true` when the root was present.
    pub fn remove_watch(&self, root: &Utf8Path) -> bool {
        self.watches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(root)
    }

    /// The watched roots in ascending path order.
    #[must_use]
    pub fn watch_roots(&self) -> Vec<Utf8PathBuf> {
        self.watches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Requests a daemon shutdown; the serve loop observes the flag.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Returns whether a shutdown has been requested.
    #[must_use]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Shared handle to the shutdown flag, for signal registration.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ServerState {
        ServerState::new(Config::default(), CommandRegistry::new())
    }

    #[test]
    fn watch_roots_are_sorted_and_deduplicated() {
        let server = state();
        assert!(server.add_watch("/var/log".into()));
        assert!(server.add_watch("/home".into()));
        assert!(!server.add_watch("/home".into()));
        let roots: Vec<String> = server
            .watch_roots()
            .into_iter()
            .map(Utf8PathBuf::into_string)
            .collect();
        assert_eq!(roots, vec!["/home", "/var/log"]);
    }

    #[test]
    fn removing_a_watch_reports_presence() {
        let server = state();
        server.add_watch("/tmp".into());
        assert!(server.remove_watch(Utf8Path::new("/tmp")));
        assert!(!server.remove_watch(Utf8Path::new("/tmp")));
    }

    #[test]
    fn shutdown_flag_is_observable_through_the_handle() {
        let server = state();
        assert!(!server.shutdown_requested());
        let handle = server.shutdown_handle();
        handle.store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(server.shutdown_requested());
    }
}

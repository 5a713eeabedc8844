//! Advertised capability names for client feature negotiation.
//!
//! Clients probe individual capabilities instead of comparing version
//! strings, so a client can ask "does this daemon support `cmd-watch`?"
//! rather than hard-coding the release that introduced it. The set is built
//! during startup registration and only ever grows.

use std::collections::HashSet;

/// The set of capability names this daemon advertises.
#[derive(Debug, Default)]
pub struct CapabilitySet {
    inner: HashSet<String>,
}

impl CapabilitySet {
    /// Creates an empty capability set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a capability name. Registering the same name twice is a
    /// no-op.
    pub fn register(&mut self, name: impl Into<String>) {
        self.inner.insert(name.into());
    }

    /// Returns whether the named capability is advertised.
    #[must_use]
    pub fn supported(&self, name: &str) -> bool {
        self.inner.contains(name)
    }

    /// Returns all advertised capability names in unspecified order.
    ///
    /// Callers must not depend on the ordering; the wire protocol documents
    /// the capability list as unordered.
    #[must_use]
    pub fn list(&self) -> Vec<&str> {
        self.inner.iter().map(String::as_str).collect()
    }

    /// Number of advertised capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns whether no capabilities are advertised yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

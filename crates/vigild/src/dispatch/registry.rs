//! Static command table built during daemon startup.
//!
//! Every command the daemon understands is described by a
//! [`CommandDefinition`] binding its name to a handler, a small flag set
//! gating where and by whom it may run, and an optional argument validator
//! for the CLI bootstrap path. The registry is populated before serving
//! starts and is read-only afterwards, so lookups need no synchronisation.

use std::collections::HashMap;
use std::ops::BitOr;
use std::sync::Arc;

use serde_json::Value;

use super::capability::CapabilitySet;
use super::errors::ArgumentError;
use super::session::Session;
use crate::server::ServerState;

/// Flag bits gating where a command is available and what policy applies.
///
/// Kept as a plain `u32` bitset; the set is small and fixed, so an external
/// flags crate would buy nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandFlags(u32);

impl CommandFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// Command may run on the CLI bootstrap path, before a daemon exists.
    pub const MODE_CLI: Self = Self(1);
    /// Command may run inside the live daemon.
    pub const MODE_DAEMON: Self = Self(1 << 1);
    /// Command does not require the session to be the daemon owner.
    pub const ALLOW_ANY_USER: Self = Self(1 << 2);
    /// Command keeps working after the daemon has poisoned itself.
    pub const POISON_IMMUNE: Self = Self(1 << 3);

    /// Returns whether every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of two flag sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for CommandFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Execution context a dispatch runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One-shot CLI bootstrap invocation.
    Cli,
    /// Live daemon serving connected sessions.
    Daemon,
}

impl ExecutionMode {
    /// The flag bit a definition must carry to run in this mode.
    #[must_use]
    pub const fn required_flag(self) -> CommandFlags {
        match self {
            Self::Cli => CommandFlags::MODE_CLI,
            Self::Daemon => CommandFlags::MODE_DAEMON,
        }
    }
}

/// Handler invoked when a command is dispatched.
///
/// A handler must produce exactly one response on the session, success or
/// error, before returning; the dispatcher never synthesises one.
pub type CommandHandler = fn(&ServerState, &mut Session<'_>, &[Value]);

/// Pre-session argument validator run on the CLI bootstrap path.
pub type CommandValidator = fn(&[Value]) -> Result<(), ArgumentError>;

/// Immutable descriptor binding a command name to its handler and policy.
pub struct CommandDefinition {
    name: &'static str,
    flags: CommandFlags,
    handler: CommandHandler,
    validator: Option<CommandValidator>,
}

impl CommandDefinition {
    /// Creates a definition with no validator.
    #[must_use]
    pub fn new(name: &'static str, flags: CommandFlags, handler: CommandHandler) -> Self {
        Self {
            name,
            flags,
            handler,
            validator: None,
        }
    }

    /// Attaches a CLI argument validator.
    #[must_use]
    pub fn with_validator(mut self, validator: CommandValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// The command's registered name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The command's flag set.
    #[must_use]
    pub fn flags(&self) -> CommandFlags {
        self.flags
    }

    /// The command's handler.
    #[must_use]
    pub fn handler(&self) -> CommandHandler {
        self.handler
    }

    /// The command's optional validator.
    #[must_use]
    pub fn validator(&self) -> Option<CommandValidator> {
        self.validator
    }
}

impl std::fmt::Debug for CommandDefinition {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("CommandDefinition")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

/// Name-keyed command table with derived capability advertisement.
///
/// Registration is append-or-overwrite-by-name; definitions are never
/// removed. Each registered command also advertises the capability
/// `cmd-<name>` so clients can probe for it individually.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: HashMap<&'static str, Arc<CommandDefinition>>,
    capabilities: CapabilitySet,
}

impl CommandRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command, replacing any previous definition of the same
    /// name without signalling an error.
    pub fn register(&mut self, definition: CommandDefinition) {
        self.capabilities
            .register(format!("cmd-{}", definition.name));
        self.commands.insert(definition.name, Arc::new(definition));
    }

    /// Advertises a capability that is not derived from a command.
    pub fn advertise(&mut self, capability: impl Into<String>) {
        self.capabilities.register(capability);
    }

    /// Looks up a command by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<CommandDefinition>> {
        self.commands.get(name).cloned()
    }

    /// Returns every definition sorted by ascending name, for help and
    /// diagnostic listings.
    #[must_use]
    pub fn list_sorted(&self) -> Vec<Arc<CommandDefinition>> {
        let mut definitions: Vec<_> = self.commands.values().cloned().collect();
        definitions.sort_by_key(|definition| definition.name());
        definitions
    }

    /// The capability set derived from registration plus any extra
    /// advertised names.
    #[must_use]
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }
}

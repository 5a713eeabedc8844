//! Built-in command table registered during bootstrap.
//!
//! Handler bodies stay deliberately small; the interesting behaviour is the
//! policy carried by each definition's flags. Introspection commands
//! (`version`, `list-capabilities`, `get-pid`, `watch-list`) are open to any
//! user and keep working after poisoning so a degraded daemon can still be
//! diagnosed. Commands that change daemon state are owner-only, and `watch`
//! is poison-sensitive: a daemon that cannot trust its own observations
//! must not take on new roots.

use camino::Utf8PathBuf;
use serde_json::{Value, json};
use tracing::info;

use crate::dispatch::{
    ArgumentError, CommandDefinition, CommandFlags, CommandRegistry, DAEMON_VERSION, Session,
};
use crate::server::ServerState;

/// Tracing target for built-in command handlers.
const COMMANDS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::commands");

/// Registers every built-in command plus the independently advertised
/// capabilities.
pub fn register_builtins(registry: &mut CommandRegistry) {
    let open = CommandFlags::ALLOW_ANY_USER | CommandFlags::POISON_IMMUNE;

    registry.register(CommandDefinition::new(
        "version",
        CommandFlags::MODE_CLI | CommandFlags::MODE_DAEMON | open,
        cmd_version,
    ));
    registry.register(CommandDefinition::new(
        "list-capabilities",
        CommandFlags::MODE_CLI | CommandFlags::MODE_DAEMON | open,
        cmd_list_capabilities,
    ));
    registry.register(CommandDefinition::new(
        "get-pid",
        CommandFlags::MODE_DAEMON | open,
        cmd_get_pid,
    ));
    registry.register(
        CommandDefinition::new("watch", CommandFlags::MODE_DAEMON, cmd_watch)
            .with_validator(validate_single_root),
    );
    registry.register(
        CommandDefinition::new(
            "watch-del",
            CommandFlags::MODE_DAEMON | CommandFlags::POISON_IMMUNE,
            cmd_watch_del,
        )
        .with_validator(validate_single_root),
    );
    registry.register(CommandDefinition::new(
        "watch-list",
        CommandFlags::MODE_DAEMON | open,
        cmd_watch_list,
    ));
    registry.register(CommandDefinition::new(
        "shutdown-server",
        CommandFlags::MODE_DAEMON | CommandFlags::POISON_IMMUNE,
        cmd_shutdown_server,
    ));

    // Capabilities that describe protocol features rather than commands.
    registry.advertise("relative-root");
    registry.advertise("wildmatch");
}

fn cmd_version(_server: &ServerState, session: &mut Session<'_>, _args: &[Value]) {
    session.send_response(json!({"version": DAEMON_VERSION}));
}

fn cmd_list_capabilities(server: &ServerState, session: &mut Session<'_>, _args: &[Value]) {
    let capabilities = server.registry().capabilities().list();
    session.send_response(json!({
        "version": DAEMON_VERSION,
        "capabilities": capabilities,
    }));
}

fn cmd_get_pid(_server: &ServerState, session: &mut Session<'_>, _args: &[Value]) {
    session.send_response(json!({"pid": std::process::id()}));
}

fn cmd_watch(server: &ServerState, session: &mut Session<'_>, args: &[Value]) {
    let Some(root) = single_root(args) else {
        session.send_error_message("wrong number of arguments to 'watch'");
        return;
    };
    let established = server.add_watch(root.clone());
    if established {
        info!(target: COMMANDS_TARGET, root = %root, "watch established");
    }
    session.send_response(json!({"watch": root}));
}

fn cmd_watch_del(server: &ServerState, session: &mut Session<'_>, args: &[Value]) {
    let Some(root) = single_root(args) else {
        session.send_error_message("wrong number of arguments to 'watch-del'");
        return;
    };
    let removed = server.remove_watch(&root);
    if removed {
        info!(target: COMMANDS_TARGET, root = %root, "watch removed");
    }
    session.send_response(json!({"watch-del": removed, "root": root}));
}

fn cmd_watch_list(server: &ServerState, session: &mut Session<'_>, _args: &[Value]) {
    session.send_response(json!({"roots": server.watch_roots()}));
}

fn cmd_shutdown_server(server: &ServerState, session: &mut Session<'_>, _args: &[Value]) {
    info!(target: COMMANDS_TARGET, "shutdown requested by owner session");
    server.request_shutdown();
    session.send_response(json!({"shutdown-server": true}));
}

/// Extracts the single root path argument shared by `watch` and
/// `watch-del`.
fn single_root(args: &[Value]) -> Option<Utf8PathBuf> {
    if args.len() != 2 {
        return None;
    }
    args.get(1)
        .and_then(Value::as_str)
        .map(Utf8PathBuf::from)
}

/// CLI validator for commands taking exactly one string root argument.
fn validate_single_root(args: &[Value]) -> Result<(), ArgumentError> {
    let name = args.first().and_then(Value::as_str).unwrap_or("watch");
    if single_root(args).is_some() {
        Ok(())
    } else {
        Err(ArgumentError::new(format!(
            "wrong number of arguments to '{name}'"
        )))
    }
}

//! The dispatch pipeline every client command passes through.
//!
//! A dispatch walks `Lookup → PermissionCheck → Execute`, exiting early on
//! the first rejection. Rejections become structured error responses on the
//! originating session; nothing on this path can take the daemon down. The
//! poison check deliberately precedes the ownership check so a poisoned
//! daemon reports its reason even to the owning process.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::errors::DispatchError;
use super::perf::PerfSample;
use super::registry::{CommandDefinition, CommandFlags, CommandRegistry, ExecutionMode};
use super::request::CommandRequest;
use super::session::{InFlightCommand, Session};
use crate::server::ServerState;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Resolves a command request against the registry.
///
/// `mode` selects strictness: `None` is the tolerant lookup-only probe used
/// for forward compatibility, where an unknown name resolves to `Ok(None)`
/// rather than an error. With a concrete mode, unknown names and mode
/// mismatches are errors.
///
/// # Errors
///
/// Returns [`DispatchError::MalformedCommand`] when the array is empty or
/// its first element is not a string, [`DispatchError::UnknownCommand`] for
/// unregistered names under a concrete mode, and
/// [`DispatchError::ModeViolation`] when the definition lacks the requested
/// mode bit.
pub fn lookup_command(
    registry: &CommandRegistry,
    request: &CommandRequest,
    mode: Option<ExecutionMode>,
) -> Result<Option<Arc<CommandDefinition>>, DispatchError> {
    if request.is_empty() {
        return Err(DispatchError::malformed(
            "expected an array with some elements",
        ));
    }
    let Some(name) = request.name() else {
        return Err(DispatchError::malformed(
            "expected element 0 to be the command name",
        ));
    };

    match registry.lookup(name) {
        Some(definition) => {
            if let Some(mode) = mode
                && !definition.flags().contains(mode.required_flag())
            {
                return Err(DispatchError::mode_violation(name));
            }
            Ok(Some(definition))
        }
        None if mode.is_some() => Err(DispatchError::unknown_command(name)),
        None => Ok(None),
    }
}

/// Validates, authorises, executes, and instruments a single command.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    server: Arc<ServerState>,
}

impl Dispatcher {
    /// Creates a dispatcher over the shared daemon state.
    #[must_use]
    pub fn new(server: Arc<ServerState>) -> Self {
        Self { server }
    }

    /// The shared daemon state this dispatcher serves.
    #[must_use]
    pub fn server(&self) -> &Arc<ServerState> {
        &self.server
    }

    /// Dispatches one command on the given session.
    ///
    /// Returns `true` iff the handler was actually invoked. Every rejection
    /// (malformed, unknown under a concrete mode, mode violation, poisoned,
    /// permission denied) is reported to the session as a structured error
    /// response and yields `false`. A `None` mode is a lookup-only probe:
    /// it never executes a handler and an unknown name is a silent no-op.
    pub fn dispatch(
        &self,
        session: &mut Session<'_>,
        request: &CommandRequest,
        mode: Option<ExecutionMode>,
    ) -> bool {
        // The guard pins the in-flight command for diagnostic logging and
        // clears it on every exit path below, rejections included.
        let mut in_flight = InFlightCommand::begin(session, request.clone());

        let definition = match lookup_command(self.server.registry(), request, mode) {
            Ok(Some(definition)) => definition,
            Ok(None) => return false,
            Err(error) => {
                in_flight.session().send_error(&error);
                return false;
            }
        };

        let Some(mode) = mode else {
            // Probe resolved a known command; probes never execute.
            return false;
        };

        if let Some(reason) = self.server.poison().reason()
            && !definition.flags().contains(CommandFlags::POISON_IMMUNE)
        {
            in_flight
                .session()
                .send_error(&DispatchError::poisoned(reason));
            return false;
        }

        if !in_flight.session().is_owner()
            && !definition.flags().contains(CommandFlags::ALLOW_ANY_USER)
        {
            in_flight
                .session()
                .send_error(&DispatchError::permission_denied(definition.name()));
            return false;
        }

        debug!(
            target: DISPATCH_TARGET,
            command = definition.name(),
            session = in_flight.session().id(),
            mode = ?mode,
            "dispatching command"
        );

        let mut sample = PerfSample::new(
            format!("dispatch:{}", definition.name()),
            self.server.config().slow_command_threshold(),
        );

        (definition.handler())(self.server.as_ref(), in_flight.session(), request.args());

        if sample.finish() {
            sample.add_meta("args", Value::Array(request.args().to_vec()));
            sample.log();
        } else {
            sample.log_completed();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::registry::CommandDefinition;
    use rstest::{fixture, rstest};
    use serde_json::json;
    use std::time::Duration;
    use vigil_config::Config;

    const DAEMON: Option<ExecutionMode> = Some(ExecutionMode::Daemon);

    fn echo_handler(_server: &ServerState, session: &mut Session<'_>, args: &[Value]) {
        session.send_response(json!({"echo": args}));
    }

    fn sleepy_handler(_server: &ServerState, session: &mut Session<'_>, _args: &[Value]) {
        std::thread::sleep(Duration::from_millis(20));
        session.send_response(json!({"slept": true}));
    }

    fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        registry.register(CommandDefinition::new(
            "find",
            CommandFlags::MODE_DAEMON | CommandFlags::ALLOW_ANY_USER,
            echo_handler,
        ));
        registry.register(CommandDefinition::new(
            "immune-cmd",
            CommandFlags::MODE_DAEMON | CommandFlags::ALLOW_ANY_USER | CommandFlags::POISON_IMMUNE,
            echo_handler,
        ));
        registry.register(CommandDefinition::new(
            "owner-only",
            CommandFlags::MODE_DAEMON,
            echo_handler,
        ));
        registry.register(CommandDefinition::new(
            "cli-only",
            CommandFlags::MODE_CLI | CommandFlags::ALLOW_ANY_USER,
            echo_handler,
        ));
        registry.register(CommandDefinition::new(
            "sleepy",
            CommandFlags::MODE_DAEMON | CommandFlags::ALLOW_ANY_USER,
            sleepy_handler,
        ));
        registry
    }

    #[fixture]
    fn dispatcher() -> Dispatcher {
        let mut config = Config::default();
        config.slow_command_threshold_ms = 5;
        Dispatcher::new(Arc::new(ServerState::new(config, registry())))
    }

    fn request(parts: &[&str]) -> CommandRequest {
        CommandRequest::from_values(parts.iter().map(|part| json!(part)).collect())
    }

    #[rstest]
    fn empty_array_is_malformed(dispatcher: Dispatcher) {
        let mut sink = Vec::new();
        let mut session = Session::new(1, true, &mut sink);
        let ran = dispatcher.dispatch(&mut session, &CommandRequest::from_values(vec![]), DAEMON);
        assert!(!ran);
        assert!(session.current_command().is_none());
        drop(session);
        let text = String::from_utf8(sink).expect("utf8");
        assert!(text.contains("expected an array with some elements"));
    }

    #[rstest]
    fn non_string_head_is_malformed(dispatcher: Dispatcher) {
        let mut sink = Vec::new();
        let mut session = Session::new(1, true, &mut sink);
        let ran = dispatcher.dispatch(
            &mut session,
            &CommandRequest::from_values(vec![json!(7)]),
            DAEMON,
        );
        assert!(!ran);
        drop(session);
        let text = String::from_utf8(sink).expect("utf8");
        assert!(text.contains("element 0 to be the command name"));
    }

    #[rstest]
    fn tolerant_probe_of_unknown_command_is_silent(dispatcher: Dispatcher) {
        let mut sink = Vec::new();
        let mut session = Session::new(1, true, &mut sink);
        let ran = dispatcher.dispatch(&mut session, &request(&["nope"]), None);
        assert!(!ran);
        drop(session);
        assert!(sink.is_empty(), "no error response for a tolerant probe");
    }

    #[rstest]
    fn tolerant_probe_of_known_command_does_not_execute(dispatcher: Dispatcher) {
        let mut sink = Vec::new();
        let mut session = Session::new(1, true, &mut sink);
        let ran = dispatcher.dispatch(&mut session, &request(&["find", "/tmp"]), None);
        assert!(!ran);
        drop(session);
        assert!(sink.is_empty(), "probes never run handlers");
    }

    #[rstest]
    fn strict_unknown_command_is_an_error(dispatcher: Dispatcher) {
        let mut sink = Vec::new();
        let mut session = Session::new(1, true, &mut sink);
        let ran = dispatcher.dispatch(&mut session, &request(&["nope"]), DAEMON);
        assert!(!ran);
        drop(session);
        let text = String::from_utf8(sink).expect("utf8");
        assert!(text.contains("unknown command nope"));
    }

    #[rstest]
    fn mode_mismatch_is_rejected(dispatcher: Dispatcher) {
        let mut sink = Vec::new();
        let mut session = Session::new(1, true, &mut sink);
        let ran = dispatcher.dispatch(&mut session, &request(&["cli-only"]), DAEMON);
        assert!(!ran);
        drop(session);
        let text = String::from_utf8(sink).expect("utf8");
        assert!(text.contains("not available in this mode"));
    }

    #[rstest]
    fn poisoned_daemon_refuses_sensitive_commands(dispatcher: Dispatcher) {
        dispatcher.server().poison().poison("disk full");

        let mut sink = Vec::new();
        let mut session = Session::new(1, true, &mut sink);
        let ran = dispatcher.dispatch(&mut session, &request(&["find", "/tmp"]), DAEMON);
        assert!(!ran);
        drop(session);
        let text = String::from_utf8(sink).expect("utf8");
        assert!(text.contains("disk full"));
    }

    #[rstest]
    fn immune_commands_survive_poisoning(dispatcher: Dispatcher) {
        dispatcher.server().poison().poison("disk full");

        let mut sink = Vec::new();
        let mut session = Session::new(1, true, &mut sink);
        let ran = dispatcher.dispatch(&mut session, &request(&["immune-cmd"]), DAEMON);
        assert!(ran);
        drop(session);
        let text = String::from_utf8(sink).expect("utf8");
        assert!(text.contains(r#""echo""#));
    }

    #[rstest]
    fn non_owner_is_denied_restricted_commands(dispatcher: Dispatcher) {
        let mut sink = Vec::new();
        let mut session = Session::new(1, false, &mut sink);
        let ran = dispatcher.dispatch(&mut session, &request(&["owner-only"]), DAEMON);
        assert!(!ran);
        assert!(
            session.current_command().is_none(),
            "in-flight reference must be released on the permission-denied path"
        );
        drop(session);
        let text = String::from_utf8(sink).expect("utf8");
        assert!(text.contains("process owner"));
    }

    #[rstest]
    fn owner_runs_restricted_commands(dispatcher: Dispatcher) {
        let mut sink = Vec::new();
        let mut session = Session::new(1, true, &mut sink);
        let ran = dispatcher.dispatch(&mut session, &request(&["owner-only"]), DAEMON);
        assert!(ran);
    }

    #[rstest]
    fn handler_sees_the_full_argument_array(dispatcher: Dispatcher) {
        let mut sink = Vec::new();
        let mut session = Session::new(1, true, &mut sink);
        let ran = dispatcher.dispatch(&mut session, &request(&["find", "/tmp"]), DAEMON);
        assert!(ran);
        assert!(session.current_command().is_none());
        drop(session);
        let text = String::from_utf8(sink).expect("utf8");
        assert!(text.contains(r#""echo":["find","/tmp"]"#));
    }

    #[rstest]
    fn slow_handlers_still_complete(dispatcher: Dispatcher) {
        // Sampling is observational: a handler past the threshold runs to
        // completion and the dispatch still reports success.
        let mut sink = Vec::new();
        let mut session = Session::new(1, true, &mut sink);
        let ran = dispatcher.dispatch(&mut session, &request(&["sleepy"]), DAEMON);
        assert!(ran);
        drop(session);
        let text = String::from_utf8(sink).expect("utf8");
        assert!(text.contains(r#""slept":true"#));
    }
}

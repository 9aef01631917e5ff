//! Commands: an action plus event handlers, persisted values and a
//! cancellable speed override.
//!
//! The override scale starts at 1 and, from the cycle after cancellation is
//! requested, drops by `period / deceleration` every cycle until it reaches 0.
//! Ramps inside the command move at their nominal rate times the override, so
//! a cancelled command decelerates to a stop instead of halting abruptly.

use cf_core::{seconds, CompareOp, DataKind, ExprId, PortId, Time, Value};
use cf_expr::{ExprArena, ExprError, ExprResult, PersistHandle, Scope};
use cf_net::{ExceptionClass, Primitive, StateKind};
use tracing::debug;

use crate::action::{lower_action, Action, ActionPorts};
use crate::error::{CompileResult, MappingError};
use crate::resolver::{ExprFactory, PortFactory};
use crate::session::Session;
use crate::state::{lower_state, StateExpr};

#[derive(Debug, Clone, PartialEq)]
pub enum Handler {
    /// Raise `class` from the command while the trigger holds.
    Throw(ExceptionClass),
    /// Request cancellation while the trigger holds.
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventHandler {
    pub trigger: StateExpr,
    pub handler: Handler,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    name: String,
    scope: Scope,
    action: Action,
    handlers: Vec<EventHandler>,
    persists: Vec<PersistHandle>,
    deceleration: Time,
    /// Network input that requests cancellation from outside.
    cancel_input: ExprId,
    /// Cancellation request, resolved once the handlers are lowered.
    cancel: ExprId,
    /// Previous-cycle scale feedback.
    scale_state: ExprId,
    scale: ExprId,
    /// Speed override applied to every ramp: user override times scale.
    effective: ExprId,
}

impl CommandSpec {
    /// Build a command running `action` in `scope`.
    ///
    /// A command must know how fast to decelerate when cancelled; `None` is
    /// rejected instead of falling back to a default.
    pub fn new(
        arena: &mut ExprArena,
        name: impl Into<String>,
        scope: Scope,
        action: Action,
        deceleration: Option<Time>,
    ) -> ExprResult<Self> {
        let name = name.into();
        let deceleration = deceleration.ok_or_else(|| ExprError::InvalidArg {
            what: format!("command '{name}' has no deceleration time"),
        })?;
        let decel_s = seconds(deceleration);
        if !(decel_s.is_finite() && decel_s > 0.0) {
            return Err(ExprError::InvalidArg {
                what: format!("command '{name}' deceleration must be positive, got {decel_s} s"),
            });
        }
        let action_scope = action.scope(arena)?;
        if !scope.encloses(action_scope) {
            return Err(ExprError::ScopeMismatch {
                left: scope,
                right: action_scope,
            });
        }

        let cancel_input = arena.input(format!("{name}.cancel"), DataKind::Boolean, scope)?;
        let cancel = arena.placeholder(format!("{name}.cancel_requested"), DataKind::Boolean, scope)?;
        let scale_state = arena.placeholder(format!("{name}.scale"), DataKind::Double, scope)?;

        let previous = arena.pre(scale_state, Value::Double(1.0))?;
        let period = arena.period()?;
        let decel = arena.double(decel_s)?;
        let rate = arena.divide(period, decel)?;
        let zero = arena.double(0.0)?;
        let one = arena.double(1.0)?;
        // Handlers may read states of motion driven by this scale.
        let requested = arena.pre(cancel, Value::Boolean(false))?;
        let step = arena.select(requested, rate, zero)?;
        let scale = arena.subtract(previous, step)?;
        let scale = arena.limit(scale, zero, one)?;

        Ok(Self {
            name,
            scope,
            action,
            handlers: Vec::new(),
            persists: Vec::new(),
            deceleration,
            cancel_input,
            cancel,
            scale_state,
            scale,
            effective: scale,
        })
    }

    /// Multiply the override scale with a user speed override.
    pub fn with_override(mut self, arena: &mut ExprArena, speed: ExprId) -> ExprResult<Self> {
        self.effective = arena.multiply(speed, self.scale)?;
        Ok(self)
    }

    pub fn on(mut self, trigger: StateExpr, handler: Handler) -> Self {
        self.handlers.push(EventHandler { trigger, handler });
        self
    }

    /// Store a persisted value at the end of every cycle the command runs.
    pub fn persisting(mut self, handle: PersistHandle) -> Self {
        self.persists.push(handle);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn deceleration(&self) -> Time {
        self.deceleration
    }

    /// Name of the boolean network input that requests cancellation.
    pub fn cancel_input_name(&self) -> String {
        format!("{}.cancel", self.name)
    }

    /// Name of the output carrying the effective speed override.
    pub fn override_output_name(&self) -> String {
        format!("{}.override", self.name)
    }

    /// Override scale in [0, 1].
    pub fn scale(&self) -> ExprId {
        self.scale
    }

    pub fn override_expr(&self) -> ExprId {
        self.effective
    }
}

/// Lower the command's action, handlers, override and persisted stores.
pub(crate) fn lower_command(session: &mut Session<'_>, command: &CommandSpec) -> CompileResult<ActionPorts> {
    let action = lower_action(session, &command.action)?;

    session.add_factory(ExprFactory::new(command.scale_state, command.scale));
    let ramps = command.action.override_placeholders();
    if !ramps.is_empty() {
        session.add_factory(ExprFactory::for_all(ramps, command.effective));
    }

    let mut ports = ActionPorts::new(command.name.clone());
    ports.outputs = action.outputs.clone();
    for (class, port) in action.states.iter() {
        ports.states.register(class.clone(), *port);
    }

    let mut cancel = vec![session.lower(command.cancel_input)?];
    for handler in &command.handlers {
        let Some(trigger) = lower_state(session, &handler.trigger, &action)? else {
            debug!(command = %command.name, handler = ?handler.handler, "handler can never fire");
            continue;
        };
        match &handler.handler {
            Handler::Throw(class) => ports.states.register(class.clone(), trigger),
            Handler::Cancel => cancel.push(trigger),
        }
    }
    let cancel = session.any_of(&cancel)?;
    session.add_factory(PortFactory::new(command.cancel, move |_: &mut Session<'_>| Ok(cancel)));

    let scale = session.lower(command.scale)?;
    let zero = session.const_port(Value::Double(0.0))?;
    let stopped = session.add(
        Primitive::Compare {
            op: CompareOp::LessEq,
        },
        &[scale, zero],
        DataKind::Boolean,
    )?;
    let cancelled = session.all_of(&[cancel, stopped])?;
    ports.states.register(StateKind::Cancelled, cancelled);

    let effective = session.lower(command.effective)?;
    ports.outputs.insert(command.override_output_name(), effective);

    for handle in &command.persists {
        store_persisted(session, *handle)?;
    }
    ports.inner.push(action);
    debug!(command = %command.name, "lowered command");
    Ok(ports)
}

fn store_persisted(session: &mut Session<'_>, handle: PersistHandle) -> CompileResult<PortId> {
    let slot = session
        .params()
        .slot(handle)
        .ok_or(MappingError::UnboundPersisted { handle })?;
    let source = session.arena().persist_source(handle)?;
    let value = session.lower(source)?;
    let kind = session.fragment().port(value)?.kind;
    let fragment = session.fragment_mut();
    let block = fragment.add_block(Primitive::PersistStore { slot }, &[kind], None)?;
    let input = fragment.block(block)?.inputs[0];
    fragment.connect(value, input)?;
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_core::s;
    use cf_expr::{CommandId, ContextId};

    fn scope() -> Scope {
        Scope::command(ContextId(1), CommandId(1))
    }

    #[test]
    fn missing_deceleration_is_rejected() {
        let mut arena = ExprArena::default();
        let err = CommandSpec::new(&mut arena, "idle", scope(), Action::wait("w", s(1.0)), None)
            .unwrap_err();
        assert!(matches!(err, ExprError::InvalidArg { .. }));
        assert!(
            CommandSpec::new(&mut arena, "idle", scope(), Action::wait("w", s(1.0)), Some(s(0.0)))
                .is_err()
        );
    }

    #[test]
    fn action_from_another_command_is_rejected() {
        let mut arena = ExprArena::default();
        let other = Scope::command(ContextId(1), CommandId(2));
        let c = arena.input("c", DataKind::Boolean, other).unwrap();
        let action = Action::wait("w", s(1.0)).raising(ExceptionClass::root("E"), c);
        let err = CommandSpec::new(&mut arena, "cmd", scope(), action, Some(s(1.0))).unwrap_err();
        assert!(matches!(err, ExprError::ScopeMismatch { .. }));
    }

    #[test]
    fn names_derive_from_command() {
        let mut arena = ExprArena::default();
        let cmd = CommandSpec::new(&mut arena, "move", scope(), Action::wait("w", s(1.0)), Some(s(0.5)))
            .unwrap();
        assert_eq!(cmd.cancel_input_name(), "move.cancel");
        assert_eq!(cmd.override_output_name(), "move.override");
        assert_eq!(cmd.scale(), cmd.override_expr());
        assert_eq!(cmd.deceleration(), s(0.5));
    }
}

//! Actions: the motion and timing building blocks of a command.
//!
//! Every action drives zero or more output channels and exposes `Active` and
//! `Completed` state ports. Actions may also declare raise sites: boolean
//! expressions that raise an exception class while true.

use std::collections::BTreeMap;

use cf_core::{seconds, CompareOp, DataKind, ExprId, PortId, Time, Value};
use cf_expr::{ExprArena, ExprError, ExprResult, Scope};
use cf_net::{ExceptionClass, Primitive, SignalClass, StateKind, StateRegistry};
use tracing::debug;

use crate::error::CompileResult;
use crate::resolver::ExprFactory;
use crate::session::Session;

/// Boolean expression that raises `class` while true.
#[derive(Debug, Clone, PartialEq)]
pub struct RaiseSite {
    pub class: ExceptionClass,
    pub condition: ExprId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    /// Follow a setpoint; complete once the feedback has stayed within
    /// tolerance for the settle time.
    Track {
        channel: String,
        setpoint: ExprId,
        within: ExprId,
        settle: Time,
    },
    /// Move towards a target with bounded rate.
    Ramp {
        channel: String,
        /// Self-reference to the ramp's own position.
        position: ExprId,
        /// Speed scale, resolved by the enclosing command.
        scale: ExprId,
        next: ExprId,
        distance: ExprId,
    },
    Wait { duration: Time },
    /// Inner action with some exception classes handled by the wrapper.
    Wrapped {
        inner: Box<Action>,
        handled: Vec<ExceptionClass>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub name: String,
    pub kind: ActionKind,
    pub raises: Vec<RaiseSite>,
}

impl Action {
    fn new(name: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            raises: Vec::new(),
        }
    }

    /// Drive `channel` with `setpoint`. Completed once `|setpoint - feedback|`
    /// has stayed at or below `tolerance` for `settle`.
    pub fn track(
        arena: &mut ExprArena,
        name: impl Into<String>,
        channel: impl Into<String>,
        setpoint: ExprId,
        feedback: ExprId,
        tolerance: f64,
        settle: Time,
    ) -> ExprResult<Self> {
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(ExprError::InvalidArg {
                what: format!("track tolerance must be non-negative, got {tolerance}"),
            });
        }
        let error = arena.subtract(setpoint, feedback)?;
        let error = arena.abs(error)?;
        let tol = arena.double(tolerance)?;
        let within = arena.less_eq(error, tol)?;
        Ok(Self::new(
            name,
            ActionKind::Track {
                channel: channel.into(),
                setpoint,
                within,
                settle,
            },
        ))
    }

    /// Move `channel` from `start` towards `target` at no more than
    /// `max_rate` units per second, scaled by the command's override.
    pub fn ramp(
        arena: &mut ExprArena,
        name: impl Into<String>,
        channel: impl Into<String>,
        start: ExprId,
        target: ExprId,
        max_rate: f64,
    ) -> ExprResult<Self> {
        if !(max_rate.is_finite() && max_rate > 0.0) {
            return Err(ExprError::InvalidArg {
                what: format!("ramp rate must be positive, got {max_rate}"),
            });
        }
        let name = name.into();
        let scope = arena.scope(start)?;
        let target_scope = arena.scope(target)?;
        let scope = scope.join(target_scope).ok_or(ExprError::ScopeMismatch {
            left: scope,
            right: target_scope,
        })?;

        let position = arena.placeholder(format!("{name}.position"), DataKind::Double, scope)?;
        let scale = arena.placeholder(format!("{name}.override"), DataKind::Double, scope)?;

        // First cycle starts from `start`, later ones from the previous position.
        let on = arena.boolean(true)?;
        let started = arena.pre(on, Value::Boolean(false))?;
        let previous = arena.pre(position, Value::Double(0.0))?;
        let from = arena.select(started, previous, start)?;

        let rate = arena.double(max_rate)?;
        let period = arena.period()?;
        let step = arena.multiply(rate, period)?;
        let step = arena.multiply(step, scale)?;
        let back = arena.negate(step)?;
        let delta = arena.subtract(target, from)?;
        let delta = arena.limit(delta, back, step)?;
        let next = arena.add(from, delta)?;

        let distance = arena.subtract(target, next)?;
        let distance = arena.abs(distance)?;
        Ok(Self::new(
            name,
            ActionKind::Ramp {
                channel: channel.into(),
                position,
                scale,
                next,
                distance,
            },
        ))
    }

    pub fn wait(name: impl Into<String>, duration: Time) -> Self {
        Self::new(name, ActionKind::Wait { duration })
    }

    pub fn wrap(name: impl Into<String>, inner: Action) -> Self {
        Self::new(
            name,
            ActionKind::Wrapped {
                inner: Box::new(inner),
                handled: Vec::new(),
            },
        )
    }

    /// Stop re-exporting inner exceptions of `class` (and its subclasses).
    /// No effect on actions that are not wrappers.
    pub fn handling(mut self, class: ExceptionClass) -> Self {
        if let ActionKind::Wrapped { handled, .. } = &mut self.kind {
            handled.push(class);
        }
        self
    }

    pub fn raising(mut self, class: ExceptionClass, condition: ExprId) -> Self {
        self.raises.push(RaiseSite { class, condition });
        self
    }

    /// Override-scale placeholders of every ramp in this action tree.
    pub fn override_placeholders(&self) -> Vec<ExprId> {
        match &self.kind {
            ActionKind::Ramp { scale, .. } => vec![*scale],
            ActionKind::Wrapped { inner, .. } => inner.override_placeholders(),
            ActionKind::Track { .. } | ActionKind::Wait { .. } => Vec::new(),
        }
    }

    /// Scope shared by all expressions this action lowers.
    pub fn scope(&self, arena: &ExprArena) -> ExprResult<Scope> {
        let (mut scope, ids) = match &self.kind {
            ActionKind::Track { setpoint, within, .. } => (Scope::Global, vec![*setpoint, *within]),
            ActionKind::Ramp { next, .. } => (Scope::Global, vec![*next]),
            ActionKind::Wait { .. } => (Scope::Global, Vec::new()),
            ActionKind::Wrapped { inner, .. } => (inner.scope(arena)?, Vec::new()),
        };
        for id in ids.into_iter().chain(self.raises.iter().map(|r| r.condition)) {
            let s = arena.scope(id)?;
            scope = scope.join(s).ok_or(ExprError::ScopeMismatch {
                left: scope,
                right: s,
            })?;
        }
        Ok(scope)
    }
}

/// Ports of a lowered action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionPorts {
    pub name: String,
    pub outputs: BTreeMap<String, PortId>,
    pub states: StateRegistry,
    pub inner: Vec<ActionPorts>,
}

impl ActionPorts {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outputs: BTreeMap::new(),
            states: StateRegistry::new(),
            inner: Vec::new(),
        }
    }

    /// This action or a nested one named `name`.
    pub fn find(&self, name: &str) -> Option<&ActionPorts> {
        if self.name == name {
            return Some(self);
        }
        self.inner.iter().find_map(|a| a.find(name))
    }
}

/// Lower `action` and register its state and exception ports.
pub(crate) fn lower_action(session: &mut Session<'_>, action: &Action) -> CompileResult<ActionPorts> {
    let mut ports = ActionPorts::new(action.name.clone());
    let completed = match &action.kind {
        ActionKind::Track {
            channel,
            setpoint,
            within,
            settle,
        } => {
            let out = session.lower(*setpoint)?;
            ports.outputs.insert(channel.clone(), out);
            let within = session.lower(*within)?;
            session.timer(within, seconds(*settle))?
        }
        ActionKind::Ramp {
            channel,
            position,
            next,
            distance,
            ..
        } => {
            session.add_factory(ExprFactory::new(*position, *next));
            let out = session.lower(*next)?;
            ports.outputs.insert(channel.clone(), out);
            let distance = session.lower(*distance)?;
            let tolerance = session.config().completion_tolerance;
            let tolerance = session.const_port(Value::Double(tolerance))?;
            session.add(
                Primitive::Compare {
                    op: CompareOp::LessEq,
                },
                &[distance, tolerance],
                DataKind::Boolean,
            )?
        }
        ActionKind::Wait { duration } => {
            let on = session.constant_bool(true)?;
            session.timer(on, seconds(*duration))?
        }
        ActionKind::Wrapped { inner, handled } => {
            let inner_ports = lower_action(session, inner)?;
            ports.outputs = inner_ports.outputs.clone();
            for (class, port) in inner_ports.states.iter() {
                match class {
                    SignalClass::State(kind) => {
                        if matches!(kind, StateKind::Milestone(_)) {
                            ports.states.register(kind.clone(), *port);
                        }
                    }
                    SignalClass::Exception(e) => {
                        if !handled.iter().any(|h| e.is_a(h)) {
                            ports.states.register(e.clone(), *port);
                        }
                    }
                }
            }
            let done = session.any_of(&inner_ports.states.state_ports(&StateKind::Completed))?;
            ports.inner.push(inner_ports);
            done
        }
    };
    ports.states.register(StateKind::Completed, completed);
    let active = session.negate(completed)?;
    ports.states.register(StateKind::Active, active);

    for site in &action.raises {
        let port = session.lower(site.condition)?;
        session.expect_boolean(port, &format!("raise site for {}", site.class))?;
        ports.states.register(site.class.clone(), port);
    }
    debug!(action = %action.name, outputs = ports.outputs.len(), "lowered action");
    Ok(ports)
}

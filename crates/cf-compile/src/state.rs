//! State expressions over action ports.
//!
//! A state expression lowers to a boolean port, or to `None` when the state
//! can never occur. `None` propagates: a conjunction with a member that never
//! occurs never occurs either, a disjunction simply drops such members.

use cf_core::{seconds, DataKind, ExprId, PortId, Time, Value};
use cf_net::{ExceptionClass, Primitive, StateKind};
use tracing::warn;

use crate::action::ActionPorts;
use crate::error::{CompileResult, MappingError};
use crate::session::Session;

#[derive(Debug, Clone, PartialEq)]
pub enum StateExpr {
    /// Boolean expression.
    Condition(ExprId),
    /// Symbolic state of the current action.
    Of(StateKind),
    And(Vec<StateExpr>),
    Or(Vec<StateExpr>),
    Not(Box<StateExpr>),
    /// Set by `activate`, cleared by `deactivate`.
    Explicit {
        activate: Box<StateExpr>,
        deactivate: Option<Box<StateExpr>>,
    },
    /// `inner` has held for at least `duration`.
    Long {
        inner: Box<StateExpr>,
        duration: Time,
    },
    /// `inner` evaluated against a nested action.
    Scoped {
        action: String,
        inner: Box<StateExpr>,
    },
    /// `inner`, also registered as milestone `name`.
    Alias {
        name: String,
        inner: Box<StateExpr>,
    },
    Exception(ExceptionClass),
}

impl StateExpr {
    pub fn condition(expr: ExprId) -> Self {
        StateExpr::Condition(expr)
    }

    pub fn active() -> Self {
        StateExpr::Of(StateKind::Active)
    }

    pub fn completed() -> Self {
        StateExpr::Of(StateKind::Completed)
    }

    pub fn and(members: impl IntoIterator<Item = StateExpr>) -> Self {
        StateExpr::And(members.into_iter().collect())
    }

    pub fn or(members: impl IntoIterator<Item = StateExpr>) -> Self {
        StateExpr::Or(members.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: StateExpr) -> Self {
        StateExpr::Not(Box::new(inner))
    }

    pub fn explicit(activate: StateExpr, deactivate: Option<StateExpr>) -> Self {
        StateExpr::Explicit {
            activate: Box::new(activate),
            deactivate: deactivate.map(Box::new),
        }
    }

    pub fn long(inner: StateExpr, duration: Time) -> Self {
        StateExpr::Long {
            inner: Box::new(inner),
            duration,
        }
    }

    pub fn scoped(action: impl Into<String>, inner: StateExpr) -> Self {
        StateExpr::Scoped {
            action: action.into(),
            inner: Box::new(inner),
        }
    }

    pub fn alias(name: impl Into<String>, inner: StateExpr) -> Self {
        StateExpr::Alias {
            name: name.into(),
            inner: Box::new(inner),
        }
    }

    pub fn exception(class: ExceptionClass) -> Self {
        StateExpr::Exception(class)
    }
}

/// Lower `expr` against the ports of `action`.
pub fn lower_state(
    session: &mut Session<'_>,
    expr: &StateExpr,
    action: &ActionPorts,
) -> CompileResult<Option<PortId>> {
    match expr {
        StateExpr::Condition(id) => {
            let arena = session.arena();
            if arena.is_constant(*id)
                && arena.cheap_value_with(*id, &session.host()) == Some(Value::Boolean(false))
            {
                return Ok(None);
            }
            let port = session.lower(*id)?;
            session.expect_boolean(port, "state condition")?;
            Ok(Some(port))
        }
        StateExpr::Of(kind) => {
            let ports = action.states.state_ports(kind);
            if ports.is_empty() {
                return Ok(None);
            }
            Ok(Some(session.any_of(&ports)?))
        }
        StateExpr::And(members) => {
            let mut ports = Vec::with_capacity(members.len());
            for member in members {
                match lower_state(session, member, action)? {
                    Some(port) => ports.push(port),
                    None => return Ok(None),
                }
            }
            Ok(Some(session.all_of(&ports)?))
        }
        StateExpr::Or(members) => {
            if members.is_empty() {
                return Ok(Some(session.constant_bool(false)?));
            }
            let mut ports = Vec::with_capacity(members.len());
            for member in members {
                match lower_state(session, member, action)? {
                    Some(port) => ports.push(port),
                    None => warn!(action = %action.name, ?member, "dropped state that never occurs"),
                }
            }
            if ports.is_empty() {
                return Ok(None);
            }
            Ok(Some(session.any_of(&ports)?))
        }
        StateExpr::Not(inner) => match lower_state(session, inner, action)? {
            Some(port) => Ok(Some(session.negate(port)?)),
            None => Ok(Some(session.constant_bool(true)?)),
        },
        StateExpr::Explicit {
            activate,
            deactivate,
        } => {
            let Some(set) = lower_state(session, activate, action)? else {
                return Ok(None);
            };
            let reset = match deactivate {
                Some(d) => lower_state(session, d, action)?,
                None => None,
            };
            let reset = match reset {
                Some(port) => port,
                None => session.constant_bool(false)?,
            };
            Ok(Some(session.add(Primitive::Latch, &[set, reset], DataKind::Boolean)?))
        }
        StateExpr::Long { inner, duration } => match lower_state(session, inner, action)? {
            Some(port) => Ok(Some(session.timer(port, seconds(*duration))?)),
            None => Ok(None),
        },
        StateExpr::Scoped {
            action: name,
            inner,
        } => {
            let scoped = action
                .find(name)
                .ok_or_else(|| MappingError::UnknownAction { name: name.clone() })?;
            lower_state(session, inner, scoped)
        }
        StateExpr::Alias { name, inner } => {
            let port = lower_state(session, inner, action)?;
            if let Some(port) = port {
                session
                    .fragment_mut()
                    .states_mut()
                    .register(StateKind::Milestone(name.clone()), port);
            }
            Ok(port)
        }
        StateExpr::Exception(class) => {
            let ports = action.states.exception_ports(class);
            if ports.is_empty() {
                return Ok(None);
            }
            Ok(Some(session.any_of(&ports)?))
        }
    }
}

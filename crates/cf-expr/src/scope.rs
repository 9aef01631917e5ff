//! Execution scopes.
//!
//! Every node is either global, bound to an execution context (a runtime that
//! owns devices), or bound to one command running inside a context. Nodes from
//! incompatible scopes are never combined.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Execution context (runtime) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(pub u32);

/// Command instance identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommandId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Scope {
    #[default]
    Global,
    Context(ContextId),
    Command {
        context: ContextId,
        command: CommandId,
    },
}

impl Scope {
    pub fn command(context: ContextId, command: CommandId) -> Self {
        Scope::Command { context, command }
    }

    pub fn context(self) -> Option<ContextId> {
        match self {
            Scope::Global => None,
            Scope::Context(c) | Scope::Command { context: c, .. } => Some(c),
        }
    }

    /// Most specific scope compatible with both, `None` if they conflict.
    pub fn join(self, other: Scope) -> Option<Scope> {
        match (self, other) {
            (Scope::Global, s) | (s, Scope::Global) => Some(s),
            (Scope::Context(a), Scope::Context(b)) => (a == b).then_some(self),
            (Scope::Context(a), cmd @ Scope::Command { context, .. })
            | (cmd @ Scope::Command { context, .. }, Scope::Context(a)) => {
                (a == context).then_some(cmd)
            }
            (Scope::Command { .. }, Scope::Command { .. }) => (self == other).then_some(self),
        }
    }

    /// True if a node of scope `inner` may be used where `self` is expected
    /// without narrowing `self`.
    pub fn encloses(self, inner: Scope) -> bool {
        self.join(inner) == Some(self)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global scope"),
            Scope::Context(c) => write!(f, "context {}", c.0),
            Scope::Command { context, command } => {
                write!(f, "command {} in context {}", command.0, context.0)
            }
        }
    }
}

//! State and exception signal registry.
//!
//! Actions and commands do not raise exceptions on the host; they expose
//! boolean ports that go true while a state holds or when an exception is
//! raised. The registry records which ports can assert which class.

use core::fmt;

use cf_core::PortId;
use serde::{Deserialize, Serialize};

/// Symbolic state of an action or command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateKind {
    Active,
    Completed,
    Cancelled,
    /// User-named intermediate state.
    Milestone(String),
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateKind::Active => write!(f, "active"),
            StateKind::Completed => write!(f, "completed"),
            StateKind::Cancelled => write!(f, "cancelled"),
            StateKind::Milestone(name) => write!(f, "milestone '{name}'"),
        }
    }
}

/// Exception class with its single-inheritance chain.
///
/// A port registered for a class also raises every ancestor of that class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExceptionClass {
    name: String,
    /// Ancestors, nearest first.
    ancestors: Vec<String>,
}

impl ExceptionClass {
    /// Class without a parent.
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ancestors: Vec::new(),
        }
    }

    /// Subclass of `self`.
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut ancestors = Vec::with_capacity(self.ancestors.len() + 1);
        ancestors.push(self.name.clone());
        ancestors.extend(self.ancestors.iter().cloned());
        Self {
            name: name.into(),
            ancestors,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<ExceptionClass> {
        let (first, rest) = self.ancestors.split_first()?;
        Some(Self {
            name: first.clone(),
            ancestors: rest.to_vec(),
        })
    }

    /// True if an exception of class `self` can be caught as `other`.
    pub fn is_a(&self, other: &ExceptionClass) -> bool {
        self.name == other.name || self.ancestors.iter().any(|a| *a == other.name)
    }
}

impl fmt::Display for ExceptionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalClass {
    State(StateKind),
    Exception(ExceptionClass),
}

impl From<StateKind> for SignalClass {
    fn from(kind: StateKind) -> Self {
        SignalClass::State(kind)
    }
}

impl From<ExceptionClass> for SignalClass {
    fn from(class: ExceptionClass) -> Self {
        SignalClass::Exception(class)
    }
}

/// Registered signal ports, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateRegistry {
    entries: Vec<(SignalClass, PortId)>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `port` asserts `class`. Registering the same pair twice is
    /// a no-op.
    pub fn register(&mut self, class: impl Into<SignalClass>, port: PortId) {
        let class = class.into();
        if !self.entries.iter().any(|(c, p)| *c == class && *p == port) {
            self.entries.push((class, port));
        }
    }

    /// Ports registered for exactly this state.
    pub fn state_ports(&self, kind: &StateKind) -> Vec<PortId> {
        self.entries
            .iter()
            .filter(|(c, _)| matches!(c, SignalClass::State(k) if k == kind))
            .map(|(_, p)| *p)
            .collect()
    }

    /// Ports registered for `class` or any of its subclasses.
    pub fn exception_ports(&self, class: &ExceptionClass) -> Vec<PortId> {
        self.entries
            .iter()
            .filter(|(c, _)| matches!(c, SignalClass::Exception(e) if e.is_a(class)))
            .map(|(_, p)| *p)
            .collect()
    }

    /// Distinct exception classes that have at least one port.
    pub fn exception_classes(&self) -> Vec<ExceptionClass> {
        let mut classes: Vec<ExceptionClass> = Vec::new();
        for (c, _) in &self.entries {
            if let SignalClass::Exception(e) = c {
                if !classes.contains(e) {
                    classes.push(e.clone());
                }
            }
        }
        classes
    }

    pub fn iter(&self) -> impl Iterator<Item = &(SignalClass, PortId)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Expression node kinds.

use cf_core::{
    BinaryOp, ClockSignal, CompareOp, ComposedKind, DataKind, ExprId, FloatKey, UnaryOp, Value,
};

use crate::host::DeviceId;
use crate::persist::PersistHandle;
use crate::scope::Scope;

/// Identity of a forward-reference placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaceholderId(pub u32);

/// How a custom node reacts to substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubstitutionRule {
    /// Rebuild the node with substituted dependencies and the same parameters.
    ReplaceDependencies,
    /// Substitution through this node is an error.
    Unsupported,
}

/// Node kind contributed by user code and lowered by a user-registered mapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomNode {
    /// Most specific mapper key.
    pub type_name: String,
    /// Fallback mapper keys, most specific first.
    pub capabilities: Vec<String>,
    pub params: Vec<FloatKey>,
    pub dependencies: Vec<ExprId>,
    pub data: DataKind,
    pub substitution: SubstitutionRule,
}

impl CustomNode {
    pub fn new(type_name: impl Into<String>, data: DataKind) -> Self {
        Self {
            type_name: type_name.into(),
            capabilities: Vec::new(),
            params: Vec::new(),
            dependencies: Vec::new(),
            data,
            substitution: SubstitutionRule::ReplaceDependencies,
        }
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    pub fn with_param(mut self, value: f64) -> Self {
        self.params.push(FloatKey::new(value));
        self
    }

    pub fn with_dependency(mut self, dep: ExprId) -> Self {
        self.dependencies.push(dep);
        self
    }

    pub fn with_substitution(mut self, rule: SubstitutionRule) -> Self {
        self.substitution = rule;
        self
    }
}

/// Concrete kind of an expression node together with its constructor
/// parameters. Two nodes are equal iff their kinds are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExprKind {
    Constant(Value),
    /// Driver-provided reading.
    Sensor {
        name: String,
        device: Option<DeviceId>,
    },
    /// Named network input set by the executor while running.
    Input { name: String },
    /// Compile-time value supplied with the compile request.
    Parameter { name: String },
    Clock(ClockSignal),
    /// Transformation between two frames, resolved through the frame topology.
    Relation { from: String, to: String },
    Placeholder { id: PlaceholderId, label: String },
    Persisted { handle: PersistHandle },
    Unary {
        op: UnaryOp,
        operand: ExprId,
    },
    Binary {
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Compare {
        op: CompareOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Select {
        condition: ExprId,
        if_true: ExprId,
        if_false: ExprId,
    },
    Limit {
        value: ExprId,
        lower: ExprId,
        upper: ExprId,
    },
    /// First-order low pass.
    Smooth {
        input: ExprId,
        time_constant: FloatKey,
    },
    RateLimit {
        input: ExprId,
        max_rate: FloatKey,
    },
    /// Value of `input` in the previous cycle.
    Pre { input: ExprId, initial: Value },
    Edge { input: ExprId, rising: bool },
    Pack { parts: Vec<ExprId> },
    Index { input: ExprId, index: usize },
    Compose {
        kind: ComposedKind,
        parts: Vec<ExprId>,
    },
    Custom(CustomNode),
}

impl ExprKind {
    /// Short name used in diagnostics.
    pub fn type_name(&self) -> &str {
        match self {
            ExprKind::Constant(_) => "constant",
            ExprKind::Sensor { .. } => "sensor",
            ExprKind::Input { .. } => "input",
            ExprKind::Parameter { .. } => "parameter",
            ExprKind::Clock(_) => "clock",
            ExprKind::Relation { .. } => "relation",
            ExprKind::Placeholder { .. } => "placeholder",
            ExprKind::Persisted { .. } => "persisted",
            ExprKind::Unary { .. } => "unary",
            ExprKind::Binary { .. } => "binary",
            ExprKind::Compare { .. } => "compare",
            ExprKind::Select { .. } => "select",
            ExprKind::Limit { .. } => "limit",
            ExprKind::Smooth { .. } => "smooth",
            ExprKind::RateLimit { .. } => "rate_limit",
            ExprKind::Pre { .. } => "pre",
            ExprKind::Edge { .. } => "edge",
            ExprKind::Pack { .. } => "pack",
            ExprKind::Index { .. } => "index",
            ExprKind::Compose { .. } => "compose",
            ExprKind::Custom(c) => &c.type_name,
        }
    }

    /// Mapper keys, most specific first.
    pub fn mapper_keys(&self) -> Vec<String> {
        match self {
            ExprKind::Unary { op, .. } => vec![format!("unary.{op}"), "unary".into()],
            ExprKind::Binary { op, .. } => vec![format!("binary.{op}"), "binary".into()],
            ExprKind::Compare { op, .. } => vec![format!("compare.{op}"), "compare".into()],
            ExprKind::Smooth { .. } | ExprKind::RateLimit { .. } => {
                vec![self.type_name().to_string(), "filter".into()]
            }
            ExprKind::Pre { .. } => vec!["pre".into(), "delay".into()],
            ExprKind::Compose { kind, .. } => {
                let specific = match kind {
                    ComposedKind::Vector => "compose.vector",
                    ComposedKind::Transform => "compose.transform",
                };
                vec![specific.into(), "compose".into()]
            }
            ExprKind::Custom(c) => {
                let mut keys = Vec::with_capacity(c.capabilities.len() + 2);
                keys.push(c.type_name.clone());
                keys.extend(c.capabilities.iter().cloned());
                keys.push("custom".into());
                keys
            }
            other => vec![other.type_name().to_string()],
        }
    }

    /// Ordered dependencies.
    pub fn dependencies(&self) -> Vec<ExprId> {
        match self {
            ExprKind::Constant(_)
            | ExprKind::Sensor { .. }
            | ExprKind::Input { .. }
            | ExprKind::Parameter { .. }
            | ExprKind::Clock(_)
            | ExprKind::Relation { .. }
            | ExprKind::Placeholder { .. }
            | ExprKind::Persisted { .. } => Vec::new(),
            ExprKind::Unary { operand, .. } => vec![*operand],
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::Compare { lhs, rhs, .. } => {
                vec![*lhs, *rhs]
            }
            ExprKind::Select {
                condition,
                if_true,
                if_false,
            } => vec![*condition, *if_true, *if_false],
            ExprKind::Limit {
                value,
                lower,
                upper,
            } => vec![*value, *lower, *upper],
            ExprKind::Smooth { input, .. }
            | ExprKind::RateLimit { input, .. }
            | ExprKind::Pre { input, .. }
            | ExprKind::Edge { input, .. }
            | ExprKind::Index { input, .. } => vec![*input],
            ExprKind::Pack { parts } | ExprKind::Compose { parts, .. } => parts.clone(),
            ExprKind::Custom(c) => c.dependencies.clone(),
        }
    }

    /// Same kind with its dependencies replaced, in order.
    ///
    /// Returns `None` when the kind has no substitution rule or the number of
    /// dependencies does not match.
    pub fn with_dependencies(&self, deps: &[ExprId]) -> Option<ExprKind> {
        let kind = match (self, deps) {
            (ExprKind::Unary { op, .. }, [operand]) => ExprKind::Unary {
                op: *op,
                operand: *operand,
            },
            (ExprKind::Binary { op, .. }, [lhs, rhs]) => ExprKind::Binary {
                op: *op,
                lhs: *lhs,
                rhs: *rhs,
            },
            (ExprKind::Compare { op, .. }, [lhs, rhs]) => ExprKind::Compare {
                op: *op,
                lhs: *lhs,
                rhs: *rhs,
            },
            (ExprKind::Select { .. }, [condition, if_true, if_false]) => ExprKind::Select {
                condition: *condition,
                if_true: *if_true,
                if_false: *if_false,
            },
            (ExprKind::Limit { .. }, [value, lower, upper]) => ExprKind::Limit {
                value: *value,
                lower: *lower,
                upper: *upper,
            },
            (ExprKind::Smooth { time_constant, .. }, [input]) => ExprKind::Smooth {
                input: *input,
                time_constant: *time_constant,
            },
            (ExprKind::RateLimit { max_rate, .. }, [input]) => ExprKind::RateLimit {
                input: *input,
                max_rate: *max_rate,
            },
            (ExprKind::Pre { initial, .. }, [input]) => ExprKind::Pre {
                input: *input,
                initial: initial.clone(),
            },
            (ExprKind::Edge { rising, .. }, [input]) => ExprKind::Edge {
                input: *input,
                rising: *rising,
            },
            (ExprKind::Index { index, .. }, [input]) => ExprKind::Index {
                input: *input,
                index: *index,
            },
            (ExprKind::Pack { parts }, deps) if parts.len() == deps.len() => ExprKind::Pack {
                parts: deps.to_vec(),
            },
            (ExprKind::Compose { kind, parts }, deps) if parts.len() == deps.len() => {
                ExprKind::Compose {
                    kind: *kind,
                    parts: deps.to_vec(),
                }
            }
            (ExprKind::Custom(c), deps)
                if c.substitution == SubstitutionRule::ReplaceDependencies
                    && c.dependencies.len() == deps.len() =>
            {
                ExprKind::Custom(CustomNode {
                    dependencies: deps.to_vec(),
                    ..c.clone()
                })
            }
            (leaf, []) if leaf.is_leaf() => leaf.clone(),
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_leaf(&self) -> bool {
        self.dependencies().is_empty()
    }

    /// Kinds whose output depends on earlier cycles.
    pub fn is_stateful(&self) -> bool {
        matches!(
            self,
            ExprKind::Smooth { .. }
                | ExprKind::RateLimit { .. }
                | ExprKind::Pre { .. }
                | ExprKind::Edge { .. }
        )
    }
}

/// An interned expression node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExprNode {
    pub kind: ExprKind,
    pub data: DataKind,
    pub scope: Scope,
    /// The value never changes once computed.
    pub constant: bool,
}

impl ExprNode {
    pub fn dependencies(&self) -> Vec<ExprId> {
        self.kind.dependencies()
    }

    /// Constant value, if this node is a literal constant.
    pub fn literal(&self) -> Option<&Value> {
        match &self.kind {
            ExprKind::Constant(v) => Some(v),
            _ => None,
        }
    }
}

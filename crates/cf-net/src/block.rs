//! Primitive blocks.
//!
//! Blocks are the executor's vocabulary:
//! - **Sources**: constants, network inputs, sensors, clock, persisted loads
//! - **Processors**: operators, filters, delays, latches, timers
//! - **Sinks**: persisted stores
//!
//! `Pre` is the only loop-breaking delay. `Clock` has no inputs, so it can
//! never close a loop, and `Edge` reads its current input, so a feedback
//! path through an edge detector still needs a `Pre`.

use cf_core::{BinaryOp, BlockId, ClockSignal, CompareOp, ComposedKind, PortId, UnaryOp, Value};
use serde::{Deserialize, Serialize};

/// Primitive kind and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Primitive {
    Constant {
        value: Value,
    },
    /// Named input set by the executor each cycle.
    Input {
        name: String,
    },
    /// Driver reading.
    Sensor {
        name: String,
        device: Option<String>,
    },
    Clock {
        signal: ClockSignal,
    },
    Unary {
        op: UnaryOp,
    },
    Binary {
        op: BinaryOp,
    },
    Compare {
        op: CompareOp,
    },
    /// Inputs: condition, if true, if false.
    Select,
    /// Inputs: value, lower, upper.
    Limit,
    /// First-order low pass.
    Smooth {
        time_constant: f64,
    },
    RateLimit {
        max_rate: f64,
    },
    /// Output is the input of the previous cycle, `initial` in the first.
    Pre {
        initial: Value,
    },
    Edge {
        rising: bool,
    },
    Pack,
    Index {
        index: usize,
    },
    Compose {
        kind: ComposedKind,
    },
    /// Pass-through. Placeholders lower to identity blocks whose input is
    /// wired once the forward reference is resolved.
    Identity,
    /// Inputs: set, reset. Set wins when both are true.
    Latch,
    /// True once the input has been continuously true for `duration` seconds.
    Timer {
        duration: f64,
    },
    /// Disjunction of any number of boolean inputs (false for none).
    AnyOf,
    /// Conjunction of any number of boolean inputs (true for none).
    AllOf,
    /// Store the input into an executor slot at the end of each cycle.
    PersistStore {
        slot: u32,
    },
    /// Value stored in an executor slot by an earlier cycle or command.
    PersistLoad {
        slot: u32,
    },
    /// Block contributed by a user mapper.
    Custom {
        type_name: String,
        params: Vec<f64>,
    },
}

impl Primitive {
    /// Short name used in diagnostics.
    pub fn name(&self) -> &str {
        match self {
            Primitive::Constant { .. } => "constant",
            Primitive::Input { .. } => "input",
            Primitive::Sensor { .. } => "sensor",
            Primitive::Clock { .. } => "clock",
            Primitive::Unary { op } => op.name(),
            Primitive::Binary { op } => op.name(),
            Primitive::Compare { op } => op.name(),
            Primitive::Select => "select",
            Primitive::Limit => "limit",
            Primitive::Smooth { .. } => "smooth",
            Primitive::RateLimit { .. } => "rate_limit",
            Primitive::Pre { .. } => "pre",
            Primitive::Edge { .. } => "edge",
            Primitive::Pack => "pack",
            Primitive::Index { .. } => "index",
            Primitive::Compose { .. } => "compose",
            Primitive::Identity => "identity",
            Primitive::Latch => "latch",
            Primitive::Timer { .. } => "timer",
            Primitive::AnyOf => "any_of",
            Primitive::AllOf => "all_of",
            Primitive::PersistStore { .. } => "persist_store",
            Primitive::PersistLoad { .. } => "persist_load",
            Primitive::Custom { type_name, .. } => type_name,
        }
    }

    /// Number of inputs this primitive expects, `None` if variadic.
    pub fn num_inputs(&self) -> Option<usize> {
        match self {
            Primitive::Constant { .. }
            | Primitive::Input { .. }
            | Primitive::Sensor { .. }
            | Primitive::Clock { .. }
            | Primitive::PersistLoad { .. } => Some(0),
            Primitive::Unary { .. }
            | Primitive::Smooth { .. }
            | Primitive::RateLimit { .. }
            | Primitive::Pre { .. }
            | Primitive::Edge { .. }
            | Primitive::Index { .. }
            | Primitive::Identity
            | Primitive::Timer { .. }
            | Primitive::PersistStore { .. } => Some(1),
            Primitive::Binary { .. } | Primitive::Compare { .. } | Primitive::Latch => Some(2),
            Primitive::Select | Primitive::Limit => Some(3),
            Primitive::Pack
            | Primitive::Compose { .. }
            | Primitive::AnyOf
            | Primitive::AllOf
            | Primitive::Custom { .. } => None,
        }
    }

    /// Check if this block is a sink (has no output).
    pub fn is_sink(&self) -> bool {
        matches!(self, Primitive::PersistStore { .. })
    }

    /// Inputs of this primitive do not constrain evaluation order. Only
    /// `Pre` qualifies; `Edge` depends on its input in the same cycle.
    pub fn is_delay(&self) -> bool {
        matches!(self, Primitive::Pre { .. })
    }
}

/// A block instance in a fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub primitive: Primitive,
    /// Input ports in slot order.
    pub inputs: Vec<PortId>,
    /// Output port, `None` for sinks.
    pub output: Option<PortId>,
}

impl Block {
    pub fn input(&self, slot: usize) -> Option<PortId> {
        self.inputs.get(slot).copied()
    }
}

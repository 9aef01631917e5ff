//! Typed block ports.

use cf_core::{BlockId, DataKind, PortId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
}

/// A port carries exactly one data kind; connected ports must agree on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub id: PortId,
    /// Block the port belongs to.
    pub block: BlockId,
    pub direction: PortDirection,
    pub kind: DataKind,
    /// Position among the block's ports of the same direction.
    pub slot: usize,
}

impl Port {
    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }

    pub fn is_output(&self) -> bool {
        self.direction == PortDirection::Output
    }
}

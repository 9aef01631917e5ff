//! Arena configuration.

use serde::{Deserialize, Serialize};

/// Options that shape how expressions are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExprConfig {
    /// Evaluate operators over constant operands at construction time and
    /// eliminate identity operands.
    pub constant_folding: bool,
}

impl Default for ExprConfig {
    fn default() -> Self {
        Self {
            constant_folding: true,
        }
    }
}

impl ExprConfig {
    /// Configuration that keeps every node exactly as written.
    pub fn without_folding() -> Self {
        Self {
            constant_folding: false,
        }
    }
}

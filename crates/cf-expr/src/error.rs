//! Error types for expression construction.

use cf_core::{CoreError, DataKind, ExprId};
use thiserror::Error;

use crate::scope::Scope;

/// Result type for expression construction.
pub type ExprResult<T> = Result<T, ExprError>;

/// Construction errors. A failed factory call never leaves a node behind.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    /// Operands bound to incompatible execution scopes.
    #[error("Scope mismatch: cannot combine {left} with {right}")]
    ScopeMismatch { left: Scope, right: Scope },

    /// Operand kinds do not fit the operator.
    #[error("Type mismatch in {op}: operands {found}")]
    TypeMismatch { op: &'static str, found: String },

    /// Invalid argument provided to a factory.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: String },

    /// Element index outside of an array, vector or transformation.
    #[error("Index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Id does not belong to this arena.
    #[error("Unknown expression {id}")]
    UnknownExpr { id: ExprId },

    /// Persisted-value handle does not belong to this arena.
    #[error("Unknown persisted handle {handle}")]
    UnknownHandle { handle: u32 },

    /// Node kind has no substitution rule.
    #[error("Unsupported substitution for node kind '{kind}'")]
    UnsupportedSubstitution { kind: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ExprError {
    pub(crate) fn type_mismatch(op: &'static str, kinds: &[DataKind]) -> Self {
        let found = kinds
            .iter()
            .map(|k| k.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        ExprError::TypeMismatch { op, found }
    }

    pub(crate) fn invalid(what: impl Into<String>) -> Self {
        ExprError::InvalidArg { what: what.into() }
    }
}

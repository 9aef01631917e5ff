//! Error types for compilation.

use cf_expr::{ExprError, PersistHandle};
use cf_net::NetError;
use thiserror::Error;

/// Result type for compile sessions.
pub type CompileResult<T> = Result<T, MappingError>;

/// Errors that abort a compile session. No fragment is produced.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MappingError {
    /// A parameter node has no value in the request.
    #[error("Missing parameter '{name}'")]
    MissingParameter { name: String },

    /// No mapper is registered for any key of the node kind.
    #[error("No mapper for node kind '{kind}' (tried {keys})")]
    Unmappable { kind: String, keys: String },

    /// A sensor's device is not present on this host.
    #[error("Device '{device}' is not available")]
    DeviceUnavailable { device: String },

    /// The frame topology has no path between two frames.
    #[error("No relation from '{from}' to '{to}'")]
    NoRelation { from: String, to: String },

    /// A persisted value is read or stored without an executor slot.
    #[error("Persisted value {handle} is not bound to a slot")]
    UnboundPersisted { handle: PersistHandle },

    /// No factory resolved a forward reference.
    #[error("Placeholder '{label}' was never resolved")]
    UnresolvedPlaceholder { label: String },

    #[error("Placeholder '{label}' was resolved twice")]
    PlaceholderResolvedTwice { label: String },

    /// A scoped state names an action that is not part of the program.
    #[error("Unknown action '{name}'")]
    UnknownAction { name: String },

    /// Lowering produced something the network cannot carry.
    #[error("Constraint violated: {what}")]
    Constraint { what: String },

    /// Invalid compile configuration.
    #[error("Configuration error: {what}")]
    Config { what: String },

    #[error(transparent)]
    Expr(#[from] ExprError),

    #[error(transparent)]
    Net(#[from] NetError),
}

impl MappingError {
    pub(crate) fn constraint(what: impl Into<String>) -> Self {
        MappingError::Constraint { what: what.into() }
    }
}

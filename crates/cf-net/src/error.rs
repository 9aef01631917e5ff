//! Error types for network fragments.

use cf_core::CoreError;
use thiserror::Error;

/// Result type for fragment operations.
pub type NetResult<T> = Result<T, NetError>;

/// Errors that can occur while building, validating or simulating a fragment.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NetError {
    /// Invalid argument provided to a fragment function.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Invalid port connection.
    #[error("Invalid connection: {what}")]
    InvalidConnection { what: String },

    /// Block or port reference not found.
    #[error("Invalid reference: {what}")]
    InvalidReference { what: String },

    /// Fragment topology error (open input, cycle without delay).
    #[error("Topology error: {what}")]
    TopologyError { what: String },

    /// A block could not be evaluated by the reference simulator.
    #[error("Simulation error: {what}")]
    Simulation { what: String },

    /// Block or port id space exhausted.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Debug export failed.
    #[error("Export failed: {0}")]
    Export(String),
}

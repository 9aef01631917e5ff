//! cf-core: stable foundation for cycleflow.
//!
//! Contains:
//! - ids (compact ids for expression, block and port tables)
//! - numeric (Real + finiteness check + float hashing)
//! - units (uom time type + constructors)
//! - value (dataflow value kinds and values)
//! - ops (primitive operator vocabulary and its pure evaluation)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod ops;
pub mod units;
pub mod value;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use numeric::*;
pub use ops::{BinaryOp, ClockSignal, CompareOp, UnaryOp};
pub use units::*;
pub use value::{ComposedKind, DataKind, Value};

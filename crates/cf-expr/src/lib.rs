//! Expression trees for time-varying values.
//!
//! A control program describes sensor readings and derived quantities as a
//! tree of pure expressions. Nodes live in an [`ExprArena`] and are
//! hash-consed: building a node that is structurally equal to an existing one
//! returns the existing [`ExprId`], so id equality is structural equality.
//!
//! # Example
//!
//! ```
//! use cf_expr::ExprArena;
//!
//! let mut arena = ExprArena::default();
//! let a = arena.double(2.0).unwrap();
//! let b = arena.double(3.0).unwrap();
//! let two = arena.double(2.0).unwrap();
//! let sum = arena.add(a, b).unwrap();
//! let c = arena.multiply(sum, two).unwrap();
//!
//! assert!(arena.is_constant(c));
//! assert_eq!(arena.cheap_value(c).and_then(|v| v.as_double()), Some(10.0));
//! ```

pub mod algebra;
pub mod arena;
pub mod config;
pub mod error;
pub mod eval;
mod fold;
pub mod host;
pub mod node;
pub mod persist;
pub mod scope;
pub mod substitute;
mod typing;

pub use arena::ExprArena;
pub use config::ExprConfig;
pub use error::{ExprError, ExprResult};
pub use host::{
    DeviceId, DeviceService, DeviceTable, FixedTopology, FrameTopology, Host, NoDevices,
    NoTopology, RelationStep,
};
pub use node::{CustomNode, ExprKind, ExprNode, PlaceholderId, SubstitutionRule};
pub use persist::PersistHandle;
pub use scope::{CommandId, ContextId, Scope};

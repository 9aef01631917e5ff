//! Operator sets per value kind.
//!
//! Every factory is a thin wrapper that names an [`ExprKind`] and hands it to
//! the arena's build path (scope join, typing, folding, interning).
//!
//! [`ExprKind`]: crate::node::ExprKind

pub mod arithmetic;
pub mod boolean;
pub mod geometry;
pub mod temporal;

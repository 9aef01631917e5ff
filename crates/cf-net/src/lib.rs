//! Dataflow network fragments for cycleflow.
//!
//! A [`NetFragment`] is the compiler's output: a set of primitive blocks with
//! typed ports, the wires between them, and a registry that names which
//! boolean outputs assert a state or raise an exception.
//!
//! # Architecture
//!
//! - Blocks are primitives (arithmetic, filters, delays, latches, timers)
//! - Every block has typed input ports and at most one output port
//! - Each input port has at most one producer; outputs fan out freely
//! - Cycles are only allowed through `Pre` (one-cycle delay) blocks
//!
//! The [`sim::NetSimulator`] steps a validated fragment cycle by cycle on the
//! host. It is the reference for what a lowered expression means.

pub mod block;
pub mod error;
pub mod fragment;
pub mod port;
pub mod registry;
pub mod sim;

pub use block::{Block, Primitive};
pub use error::{NetError, NetResult};
pub use fragment::{Connection, NetFragment};
pub use port::{Port, PortDirection};
pub use registry::{ExceptionClass, SignalClass, StateKind, StateRegistry};
pub use sim::NetSimulator;

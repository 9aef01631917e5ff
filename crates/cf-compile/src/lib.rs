//! Compiles expression trees, actions and commands into network fragments.
//!
//! # Pipeline
//!
//! 1. A [`Session`] lowers expressions depth-first through the
//!    [`MapperRegistry`], caching one output port per node
//! 2. Actions and commands add their state, exception and override logic
//! 3. Forward references (placeholders) are resolved by factories
//! 4. The fragment is validated and wrapped into a [`CompiledNet`]
//!
//! # Example
//!
//! ```
//! use cf_compile::{CompileConfig, CompileRequest, Compiler};
//! use cf_core::DataKind;
//! use cf_expr::{ExprArena, Host};
//!
//! let mut arena = ExprArena::default();
//! let x = arena.sensor("x", DataKind::Double).unwrap();
//! let two = arena.double(2.0).unwrap();
//! let y = arena.multiply(x, two).unwrap();
//!
//! let compiler = Compiler::new(CompileConfig::default());
//! let net = compiler
//!     .lower(&arena, Host::offline(), &CompileRequest::expr(y))
//!     .unwrap();
//! assert!(net.root().is_some());
//! assert_eq!(net.fragment().blocks().len(), 3);
//! ```

pub mod action;
pub mod command;
pub mod compiled;
pub mod compiler;
pub mod config;
pub mod error;
pub mod mapper;
pub mod observe;
pub mod params;
pub mod resolver;
pub mod session;
pub mod state;

pub use action::{Action, ActionKind, ActionPorts, RaiseSite};
pub use command::{CommandSpec, EventHandler, Handler};
pub use compiled::CompiledNet;
pub use compiler::{CompileRequest, Compiler, Lowerable};
pub use config::CompileConfig;
pub use error::{CompileResult, MappingError};
pub use mapper::{MapperRegistry, NodeMapper};
pub use observe::{ListenerError, ListenerException, ListenerHub, SubscriptionHandle, ValueUpdate};
pub use params::Parameters;
pub use resolver::{ExprFactory, PlaceholderFactory, PlaceholderRef, PortFactory, Resolution};
pub use session::Session;
pub use state::{lower_state, StateExpr};

//! Persisted-value bridge.
//!
//! A value computed inside a command can outlive the command: `persist` records
//! the source expression and the scope that will read it back, and hands out a
//! [`PersistHandle`]. `persisted(handle)` is an ordinary leaf in the target
//! scope. The compiler binds each handle to an executor storage slot.

use core::fmt;

use cf_core::ExprId;
use serde::{Deserialize, Serialize};

use crate::arena::ExprArena;
use crate::error::{ExprError, ExprResult};
use crate::node::{ExprKind, ExprNode};
use crate::scope::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PersistHandle(pub u32);

impl fmt::Display for PersistHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "persist#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PersistEntry {
    pub(crate) source: ExprId,
    pub(crate) target: Scope,
}

impl ExprArena {
    /// Register `source` to be carried over into `target`.
    ///
    /// `target` must be reachable from the source scope: the same command,
    /// its context, or global.
    pub fn persist(&mut self, source: ExprId, target: Scope) -> ExprResult<PersistHandle> {
        let source_scope = self.scope(source)?;
        if !source_scope.encloses(target) {
            return Err(ExprError::ScopeMismatch {
                left: source_scope,
                right: target,
            });
        }
        let handle = PersistHandle(self.persisted.len() as u32);
        self.persisted.push(PersistEntry { source, target });
        Ok(handle)
    }

    /// Leaf node reading the persisted value back in its target scope.
    pub fn persisted(&mut self, handle: PersistHandle) -> ExprResult<ExprId> {
        let entry = self.entry(handle)?.clone();
        let data = self.data_kind(entry.source)?;
        self.intern(ExprNode {
            kind: ExprKind::Persisted { handle },
            data,
            scope: entry.target,
            constant: false,
        })
    }

    /// Expression whose value a handle carries.
    pub fn persist_source(&self, handle: PersistHandle) -> ExprResult<ExprId> {
        Ok(self.entry(handle)?.source)
    }

    pub fn persisted_handles(&self) -> impl Iterator<Item = PersistHandle> + '_ {
        (0..self.persisted.len() as u32).map(PersistHandle)
    }

    fn entry(&self, handle: PersistHandle) -> ExprResult<&PersistEntry> {
        self.persisted
            .get(handle.0 as usize)
            .ok_or(ExprError::UnknownHandle { handle: handle.0 })
    }
}

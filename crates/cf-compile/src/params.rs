//! Compile-time parameter values and persisted-slot bindings.

use std::collections::HashMap;

use cf_core::Value;
use cf_expr::PersistHandle;

/// Values supplied with a compile request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    values: HashMap<String, Value>,
    slots: HashMap<PersistHandle, u32>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Bind a persisted value to an executor storage slot.
    pub fn bind_persisted(&mut self, handle: PersistHandle, slot: u32) {
        self.slots.insert(handle, slot);
    }

    pub fn slot(&self, handle: PersistHandle) -> Option<u32> {
        self.slots.get(&handle).copied()
    }
}

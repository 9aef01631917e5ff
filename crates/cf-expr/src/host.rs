//! External services consumed by the expression algebra.
//!
//! The algebra never searches frame relations or talks to drivers itself; it
//! asks a [`DeviceService`] whether a device is present and which context owns
//! it, and a [`FrameTopology`] which chain of relations connects two frames.

use std::collections::HashMap;

use cf_core::Value;
use nalgebra::Isometry3;
use serde::{Deserialize, Serialize};

use crate::scope::ContextId;

/// Identifier of a device known to the driver layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Device/driver identity service.
pub trait DeviceService: Send + Sync {
    /// True if the driver for `device` is loaded and reachable.
    fn is_present(&self, device: &DeviceId) -> bool;

    /// Context that owns the device, if it is bound to one.
    fn context_of(&self, device: &DeviceId) -> Option<ContextId>;

    /// Latest host-side reading of a sensor, if the host has one.
    fn last_value(&self, _sensor: &str) -> Option<Value> {
        None
    }
}

/// Device service for hosts without any driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDevices;

impl DeviceService for NoDevices {
    fn is_present(&self, _device: &DeviceId) -> bool {
        false
    }

    fn context_of(&self, _device: &DeviceId) -> Option<ContextId> {
        None
    }
}

#[derive(Debug, Clone)]
struct DeviceEntry {
    present: bool,
    context: Option<ContextId>,
}

/// In-memory device service.
#[derive(Debug, Clone, Default)]
pub struct DeviceTable {
    devices: HashMap<DeviceId, DeviceEntry>,
    readings: HashMap<String, Value>,
}

impl DeviceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a present device owned by `context`.
    pub fn add_device(&mut self, device: DeviceId, context: Option<ContextId>) {
        self.devices.insert(
            device,
            DeviceEntry {
                present: true,
                context,
            },
        );
    }

    pub fn set_present(&mut self, device: &DeviceId, present: bool) {
        if let Some(entry) = self.devices.get_mut(device) {
            entry.present = present;
        }
    }

    /// Record the latest host-side reading of a sensor.
    pub fn record(&mut self, sensor: impl Into<String>, value: Value) {
        self.readings.insert(sensor.into(), value);
    }
}

impl DeviceService for DeviceTable {
    fn is_present(&self, device: &DeviceId) -> bool {
        self.devices.get(device).is_some_and(|d| d.present)
    }

    fn context_of(&self, device: &DeviceId) -> Option<ContextId> {
        self.devices.get(device).and_then(|d| d.context)
    }

    fn last_value(&self, sensor: &str) -> Option<Value> {
        self.readings.get(sensor).cloned()
    }
}

/// One hop of a frame relation path.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationStep {
    /// Relation that never changes.
    Fixed(Isometry3<f64>),
    /// Relation measured by a transform-valued sensor.
    Measured {
        sensor: String,
        device: Option<DeviceId>,
        /// The sensor measures the opposite direction.
        inverted: bool,
    },
}

/// Frame/relation service.
pub trait FrameTopology: Send + Sync {
    /// Relations to compose, in order, to get the transformation from `from`
    /// to `to`. `None` if the frames are not connected.
    fn path(&self, from: &str, to: &str) -> Option<Vec<RelationStep>>;
}

/// Topology that only knows the identity relation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTopology;

impl FrameTopology for NoTopology {
    fn path(&self, from: &str, to: &str) -> Option<Vec<RelationStep>> {
        (from == to).then(Vec::new)
    }
}

/// Topology backed by an explicit table of paths.
#[derive(Debug, Clone, Default)]
pub struct FixedTopology {
    paths: HashMap<(String, String), Vec<RelationStep>>,
}

impl FixedTopology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: impl Into<String>, to: impl Into<String>, path: Vec<RelationStep>) {
        self.paths.insert((from.into(), to.into()), path);
    }
}

impl FrameTopology for FixedTopology {
    fn path(&self, from: &str, to: &str) -> Option<Vec<RelationStep>> {
        if from == to {
            return Some(Vec::new());
        }
        self.paths
            .get(&(from.to_string(), to.to_string()))
            .cloned()
    }
}

/// Bundle of host services handed to evaluation and compilation.
#[derive(Clone, Copy)]
pub struct Host<'a> {
    pub devices: &'a dyn DeviceService,
    pub topology: &'a dyn FrameTopology,
}

impl<'a> Host<'a> {
    pub fn new(devices: &'a dyn DeviceService, topology: &'a dyn FrameTopology) -> Self {
        Self { devices, topology }
    }
}

impl Host<'static> {
    /// Host without drivers or frame knowledge.
    pub fn offline() -> Self {
        Self {
            devices: &NoDevices,
            topology: &NoTopology,
        }
    }
}

impl core::fmt::Debug for Host<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Host").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_table_tracks_presence() {
        let mut table = DeviceTable::new();
        let arm = DeviceId::new("arm");
        table.add_device(arm.clone(), Some(ContextId(3)));
        assert!(table.is_present(&arm));
        assert_eq!(table.context_of(&arm), Some(ContextId(3)));
        table.set_present(&arm, false);
        assert!(!table.is_present(&arm));
        assert!(!table.is_present(&DeviceId::new("gripper")));
    }

    #[test]
    fn identity_path_is_empty() {
        assert_eq!(NoTopology.path("world", "world"), Some(Vec::new()));
        assert_eq!(NoTopology.path("world", "tool"), None);
        assert_eq!(FixedTopology::new().path("base", "base"), Some(Vec::new()));
    }
}

//! Host-side queries: cheap value and availability.
//!
//! Both are probes. They never fail: `None` means "not known without running
//! the network" and `false` means "cannot run on this host right now".

use std::collections::HashMap;

use cf_core::ops::{
    apply_binary, apply_compare, apply_compose, apply_index, apply_limit, apply_pack, apply_unary,
};
use cf_core::{ExprId, Value};
use nalgebra::Isometry3;

use crate::arena::ExprArena;
use crate::host::{Host, RelationStep};
use crate::node::ExprKind;

/// Evaluate a pure (stateless, non-leaf) kind on its dependency values.
pub(crate) fn apply_pure(kind: &ExprKind, args: &[Value]) -> Option<Value> {
    match (kind, args) {
        (ExprKind::Unary { op, .. }, [x]) => apply_unary(*op, x),
        (ExprKind::Binary { op, .. }, [a, b]) => apply_binary(*op, a, b),
        (ExprKind::Compare { op, .. }, [a, b]) => apply_compare(*op, a, b),
        (ExprKind::Select { .. }, [c, t, f]) => {
            if c.as_bool()? {
                Some(t.clone())
            } else {
                Some(f.clone())
            }
        }
        (ExprKind::Limit { .. }, [v, lo, hi]) => apply_limit(v, lo, hi),
        (ExprKind::Index { index, .. }, [x]) => apply_index(x, *index),
        (ExprKind::Pack { .. }, parts) => apply_pack(parts),
        (ExprKind::Compose { kind, .. }, parts) => apply_compose(*kind, parts),
        _ => None,
    }
}

fn relation_value(host: &Host<'_>, from: &str, to: &str) -> Option<Value> {
    let path = host.topology.path(from, to)?;
    let mut acc = Isometry3::identity();
    for step in path {
        let t = match step {
            RelationStep::Fixed(t) => t,
            RelationStep::Measured {
                sensor, inverted, ..
            } => {
                let t = host.devices.last_value(&sensor)?.as_transform()?;
                if inverted { t.inverse() } else { t }
            }
        };
        acc *= t;
    }
    Some(Value::Transform(acc))
}

fn relation_available(host: &Host<'_>, from: &str, to: &str) -> bool {
    let Some(path) = host.topology.path(from, to) else {
        return false;
    };
    path.iter().all(|step| match step {
        RelationStep::Fixed(_) => true,
        RelationStep::Measured { device, .. } => {
            device.as_ref().is_none_or(|d| host.devices.is_present(d))
        }
    })
}

impl ExprArena {
    /// Value known without running the network, on a host without drivers.
    pub fn cheap_value(&self, id: ExprId) -> Option<Value> {
        self.cheap_value_with(id, &Host::offline())
    }

    /// Value known without running the network, consulting host services for
    /// sensor readings and frame relations.
    pub fn cheap_value_with(&self, id: ExprId, host: &Host<'_>) -> Option<Value> {
        let mut memo = HashMap::new();
        self.cheap(id, host, &mut memo)
    }

    fn cheap(
        &self,
        id: ExprId,
        host: &Host<'_>,
        memo: &mut HashMap<ExprId, Option<Value>>,
    ) -> Option<Value> {
        if let Some(v) = memo.get(&id) {
            return v.clone();
        }
        let node = self.get(id)?;
        let value = match &node.kind {
            ExprKind::Constant(v) => Some(v.clone()),
            ExprKind::Sensor { name, .. } => host
                .devices
                .last_value(name)
                .filter(|v| v.kind() == node.data),
            ExprKind::Relation { from, to } => relation_value(host, from, to),
            ExprKind::Smooth { input, .. } | ExprKind::RateLimit { input, .. } => {
                if self.is_constant(*input) {
                    self.cheap(*input, host, memo)
                } else {
                    None
                }
            }
            kind if kind.is_leaf() || kind.is_stateful() => None,
            ExprKind::Custom(_) => None,
            kind => {
                let mut args = Vec::new();
                for dep in kind.dependencies() {
                    args.push(self.cheap(dep, host, memo)?);
                }
                apply_pure(kind, &args)
            }
        };
        memo.insert(id, value.clone());
        value
    }

    /// True if the node can be computed on the given host.
    pub fn available(&self, id: ExprId, host: &Host<'_>) -> bool {
        let mut memo = HashMap::new();
        self.avail(id, host, &mut memo)
    }

    fn avail(&self, id: ExprId, host: &Host<'_>, memo: &mut HashMap<ExprId, bool>) -> bool {
        if let Some(&a) = memo.get(&id) {
            return a;
        }
        let Some(node) = self.get(id) else {
            return false;
        };
        let result = match &node.kind {
            ExprKind::Sensor {
                device: Some(device),
                ..
            } => host.devices.is_present(device),
            ExprKind::Relation { from, to } => relation_available(host, from, to),
            kind => kind
                .dependencies()
                .into_iter()
                .all(|dep| self.avail(dep, host, memo)),
        };
        memo.insert(id, result);
        result
    }
}

#[cfg(test)]
mod tests {
    use cf_core::DataKind;
    use nalgebra::Vector3;

    use super::*;
    use crate::host::{DeviceId, DeviceTable, FixedTopology, NoTopology};
    use crate::scope::ContextId;

    #[test]
    fn sensor_value_comes_from_host() {
        let mut devices = DeviceTable::new();
        devices.record("temp", Value::Double(21.5));
        let mut arena = ExprArena::default();
        let s = arena.sensor("temp", DataKind::Double).unwrap();
        let host = Host::new(&devices, &NoTopology);
        assert_eq!(arena.cheap_value(s), None);
        assert_eq!(arena.cheap_value_with(s, &host), Some(Value::Double(21.5)));
    }

    #[test]
    fn sensor_reading_of_wrong_kind_is_unknown() {
        let mut devices = DeviceTable::new();
        devices.record("temp", Value::Boolean(true));
        let mut arena = ExprArena::default();
        let s = arena.sensor("temp", DataKind::Double).unwrap();
        assert_eq!(arena.cheap_value_with(s, &Host::new(&devices, &NoTopology)), None);
    }

    #[test]
    fn relation_composes_path() {
        let mut devices = DeviceTable::new();
        let arm = DeviceId::new("arm");
        devices.add_device(arm.clone(), Some(ContextId(1)));
        let joint = Value::transform(Vector3::new(0.0, 1.0, 0.0), Vector3::zeros());
        devices.record("joint", joint);
        let mut topo = FixedTopology::new();
        let base = Value::transform(Vector3::new(1.0, 0.0, 0.0), Vector3::zeros())
            .as_transform()
            .unwrap();
        topo.insert(
            "world",
            "tool",
            vec![
                RelationStep::Fixed(base),
                RelationStep::Measured {
                    sensor: "joint".into(),
                    device: Some(arm.clone()),
                    inverted: false,
                },
            ],
        );
        let mut arena = ExprArena::default();
        let rel = arena.relation("world", "tool").unwrap();
        let host = Host::new(&devices, &topo);
        let t = arena.cheap_value_with(rel, &host).unwrap().as_transform().unwrap();
        assert!((t.translation.vector - Vector3::new(1.0, 1.0, 0.0)).norm() < 1e-12);
        assert!(arena.available(rel, &host));

        devices.set_present(&arm, false);
        let host = Host::new(&devices, &topo);
        assert!(!arena.available(rel, &host));
    }

    #[test]
    fn availability_is_a_conjunction() {
        let mut devices = DeviceTable::new();
        let axis = DeviceId::new("axis");
        devices.add_device(axis.clone(), None);
        let mut arena = ExprArena::default();
        let pos = arena.device_sensor(&devices, axis.clone(), "pos", DataKind::Double).unwrap();
        let free = arena.sensor("free", DataKind::Double).unwrap();
        let sum = arena.add(pos, free).unwrap();
        assert!(arena.available(sum, &Host::new(&devices, &NoTopology)));
        devices.set_present(&axis, false);
        assert!(!arena.available(sum, &Host::new(&devices, &NoTopology)));
        assert!(arena.available(free, &Host::offline()));
    }

    #[test]
    fn stateful_nodes_have_no_cheap_value() {
        let mut arena = ExprArena::default();
        let one = arena.double(1.0).unwrap();
        let delayed = arena.pre(one, Value::Double(0.0)).unwrap();
        assert_eq!(arena.cheap_value(delayed), None);
    }
}

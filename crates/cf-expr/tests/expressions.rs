//! Integration tests for cf-expr.

use std::collections::HashMap;

use cf_core::{s, DataKind, Value};
use cf_expr::{
    CommandId, ContextId, CustomNode, DeviceId, DeviceTable, ExprArena, ExprConfig, ExprError,
    Host, NoTopology, Scope,
};
use nalgebra::Vector3;

#[test]
fn structurally_equal_trees_share_ids() {
    let mut arena = ExprArena::default();
    let build = |arena: &mut ExprArena| {
        let x = arena.sensor("x", DataKind::Double).unwrap();
        let y = arena.sensor("y", DataKind::Double).unwrap();
        let sin = arena.sin(x).unwrap();
        let p = arena.multiply(sin, y).unwrap();
        arena.smooth(p, s(0.2)).unwrap()
    };
    let a = build(&mut arena);
    let len = arena.len();
    let b = build(&mut arena);
    assert_eq!(a, b);
    assert_eq!(arena.len(), len);
}

#[test]
fn cheap_value_propagates_through_pure_nodes() {
    let mut devices = DeviceTable::new();
    devices.record("pos", Value::Double(2.0));
    let mut arena = ExprArena::default();
    let pos = arena.sensor("pos", DataKind::Double).unwrap();
    let gain = arena.double(3.0).unwrap();
    let scaled = arena.multiply(pos, gain).unwrap();
    let limit = arena.double(5.0).unwrap();
    let zero = arena.double(0.0).unwrap();
    let clamped = arena.limit(scaled, zero, limit).unwrap();

    assert_eq!(arena.cheap_value(clamped), None);
    let host = Host::new(&devices, &NoTopology);
    assert_eq!(arena.cheap_value_with(clamped, &host), Some(Value::Double(5.0)));
}

#[test]
fn command_scope_joins_with_its_context() {
    let mut arena = ExprArena::default();
    let ctx = Scope::Context(ContextId(1));
    let cmd = Scope::command(ContextId(1), CommandId(2));
    let a = arena.input("a", DataKind::Double, ctx).unwrap();
    let b = arena.input("b", DataKind::Double, cmd).unwrap();
    let g = arena.time().unwrap();
    let sum = arena.add(a, b).unwrap();
    let sum = arena.add(sum, g).unwrap();
    assert_eq!(arena.scope(sum).unwrap(), cmd);

    let other = arena.input("c", DataKind::Double, Scope::command(ContextId(1), CommandId(3))).unwrap();
    assert!(matches!(
        arena.add(sum, other),
        Err(ExprError::ScopeMismatch { .. })
    ));
}

#[test]
fn device_scope_conflicts_are_construction_errors() {
    let mut devices = DeviceTable::new();
    devices.add_device(DeviceId::new("left"), Some(ContextId(1)));
    devices.add_device(DeviceId::new("right"), Some(ContextId(2)));
    let mut arena = ExprArena::default();
    let l = arena.device_sensor(&devices, DeviceId::new("left"), "q", DataKind::Double).unwrap();
    let r = arena.device_sensor(&devices, DeviceId::new("right"), "q", DataKind::Double).unwrap();
    assert_ne!(l, r);
    let before = arena.len();
    assert!(arena.add(l, r).is_err());
    assert_eq!(arena.len(), before);
}

#[test]
fn custom_nodes_intern_by_parameters() {
    let mut arena = ExprArena::default();
    let x = arena.sensor("x", DataKind::Double).unwrap();
    let make = |gain: f64| {
        CustomNode::new("deadband", DataKind::Double)
            .with_capability("filter")
            .with_param(gain)
            .with_dependency(x)
    };
    let a = arena.custom(make(0.1)).unwrap();
    let b = arena.custom(make(0.1)).unwrap();
    let c = arena.custom(make(0.2)).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(matches!(
        arena.custom(make(f64::INFINITY)),
        Err(ExprError::Core(_))
    ));

    let y = arena.sensor("y", DataKind::Double).unwrap();
    let swapped = arena.substitute(a, &HashMap::from([(x, y)])).unwrap();
    assert_eq!(arena.dependencies(swapped), vec![y]);
}

#[test]
fn relation_parts_are_typed() {
    let mut arena = ExprArena::default();
    let rel = arena.relation("world", "tool").unwrap();
    let inv = arena.invert(rel).unwrap();
    assert_eq!(arena.invert(inv).unwrap(), rel);
    let p = arena.constant(Value::Vector(Vector3::new(1.0, 2.0, 3.0))).unwrap();
    let moved = arena.apply(rel, p).unwrap();
    assert_eq!(arena.data_kind(moved).unwrap(), DataKind::VECTOR);
    assert!(arena.apply(p, rel).is_err());
}

#[test]
fn folding_can_be_switched_off_per_arena() {
    let mut folded = ExprArena::default();
    let mut plain = ExprArena::new(ExprConfig::without_folding());
    for arena in [&mut folded, &mut plain] {
        let x = arena.sensor("x", DataKind::Double).unwrap();
        let zero = arena.double(0.0).unwrap();
        let sum = arena.add(x, zero).unwrap();
        let expect_same = arena.config().constant_folding;
        assert_eq!(sum == x, expect_same);
    }
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn constant_arithmetic_folds(a in -1.0e6_f64..1.0e6, b in -1.0e6_f64..1.0e6) {
            let mut arena = ExprArena::default();
            let ea = arena.double(a).unwrap();
            let eb = arena.double(b).unwrap();
            let sum = arena.add(ea, eb).unwrap();
            let prod = arena.multiply(ea, eb).unwrap();
            prop_assert_eq!(arena.literal(sum), Some(&Value::Double(a + b)));
            prop_assert_eq!(arena.literal(prod), Some(&Value::Double(a * b)));

            let mut plain = ExprArena::new(ExprConfig::without_folding());
            let pa = plain.double(a).unwrap();
            let pb = plain.double(b).unwrap();
            let psum = plain.add(pa, pb).unwrap();
            prop_assert_eq!(plain.cheap_value(psum), Some(Value::Double(a + b)));
        }

        #[test]
        fn constants_merge_regardless_of_grouping(a in -1.0e3_f64..1.0e3, b in -1.0e3_f64..1.0e3) {
            let mut arena = ExprArena::default();
            let x = arena.sensor("x", DataKind::Double).unwrap();
            let ca = arena.double(a).unwrap();
            let cb = arena.double(b).unwrap();
            let left = arena.add(ca, x).unwrap();
            let left = arena.add(left, cb).unwrap();
            let cab = arena.double(a + b).unwrap();
            let right = arena.add(x, cab).unwrap();
            prop_assert_eq!(left, right);
        }

        #[test]
        fn substitution_with_itself_is_identity(c in -10.0_f64..10.0) {
            let mut arena = ExprArena::default();
            let x = arena.sensor("x", DataKind::Double).unwrap();
            let k = arena.double(c).unwrap();
            let prod = arena.multiply(x, k).unwrap();
            let root = arena.sin(prod).unwrap();
            let out = arena.substitute(root, &HashMap::from([(x, x)])).unwrap();
            prop_assert_eq!(out, root);
        }
    }
}

//! Arrays, vectors and rigid transformations.

use cf_core::{BinaryOp, ComposedKind, ExprId, UnaryOp};

use crate::arena::ExprArena;
use crate::error::ExprResult;
use crate::node::ExprKind;

impl ExprArena {
    /// Array of doubles.
    pub fn pack(&mut self, parts: &[ExprId]) -> ExprResult<ExprId> {
        self.build(ExprKind::Pack {
            parts: parts.to_vec(),
        })
    }

    /// Element of an array or vector, or part of a transformation
    /// (0 = translation, 1 = roll/pitch/yaw).
    pub fn index(&mut self, input: ExprId, index: usize) -> ExprResult<ExprId> {
        self.build(ExprKind::Index { input, index })
    }

    pub fn vector(&mut self, x: ExprId, y: ExprId, z: ExprId) -> ExprResult<ExprId> {
        self.build(ExprKind::Compose {
            kind: ComposedKind::Vector,
            parts: vec![x, y, z],
        })
    }

    /// Transformation from a translation vector and a roll/pitch/yaw vector.
    pub fn transform(&mut self, translation: ExprId, rpy: ExprId) -> ExprResult<ExprId> {
        self.build(ExprKind::Compose {
            kind: ComposedKind::Transform,
            parts: vec![translation, rpy],
        })
    }

    pub fn norm(&mut self, v: ExprId) -> ExprResult<ExprId> {
        self.unary(UnaryOp::Norm, v)
    }

    pub fn dot(&mut self, lhs: ExprId, rhs: ExprId) -> ExprResult<ExprId> {
        self.binary(BinaryOp::Dot, lhs, rhs)
    }

    pub fn cross(&mut self, lhs: ExprId, rhs: ExprId) -> ExprResult<ExprId> {
        self.binary(BinaryOp::Cross, lhs, rhs)
    }

    pub fn invert(&mut self, t: ExprId) -> ExprResult<ExprId> {
        self.unary(UnaryOp::Invert, t)
    }

    /// Point `v` expressed through transformation `t`.
    pub fn apply(&mut self, t: ExprId, v: ExprId) -> ExprResult<ExprId> {
        self.binary(BinaryOp::Apply, t, v)
    }
}

#[cfg(test)]
mod tests {
    use cf_core::{DataKind, Value};
    use nalgebra::Vector3;

    use crate::error::ExprError;

    use super::*;

    #[test]
    fn constant_vector_folds() {
        let mut arena = ExprArena::default();
        let x = arena.double(3.0).unwrap();
        let y = arena.double(4.0).unwrap();
        let z = arena.double(0.0).unwrap();
        let v = arena.vector(x, y, z).unwrap();
        let n = arena.norm(v).unwrap();
        assert_eq!(arena.literal(n), Some(&Value::Double(5.0)));
    }

    #[test]
    fn index_is_bounds_checked() {
        let mut arena = ExprArena::default();
        let a = arena.sensor("a", DataKind::Double).unwrap();
        let packed = arena.pack(&[a, a]).unwrap();
        assert_eq!(
            arena.index(packed, 2),
            Err(ExprError::IndexOutOfBounds { index: 2, len: 2 })
        );
        let rel = arena.relation("world", "tool").unwrap();
        let t = arena.index(rel, 0).unwrap();
        assert_eq!(arena.data_kind(t).unwrap(), DataKind::VECTOR);
        assert!(arena.index(rel, 2).is_err());
    }

    #[test]
    fn empty_pack_is_invalid() {
        let mut arena = ExprArena::default();
        assert!(matches!(arena.pack(&[]), Err(ExprError::InvalidArg { .. })));
    }

    #[test]
    fn apply_constant_transform() {
        let mut arena = ExprArena::default();
        let t = arena.constant(Value::transform(Vector3::new(0.0, 0.0, 1.0), Vector3::zeros())).unwrap();
        let p = arena.constant(Value::Vector(Vector3::new(1.0, 0.0, 0.0))).unwrap();
        let moved = arena.apply(t, p).unwrap();
        assert_eq!(
            arena.literal(moved),
            Some(&Value::Vector(Vector3::new(1.0, 0.0, 1.0)))
        );
        let inv = arena.invert(t).unwrap();
        let back = arena.apply(inv, moved).unwrap();
        let v = arena.literal(back).and_then(Value::as_vector).unwrap();
        assert!((v - Vector3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
    }
}

//! Arithmetic, trigonometric and comparison operators on doubles and integers.

use cf_core::{BinaryOp, CompareOp, ExprId, UnaryOp};

use crate::arena::ExprArena;
use crate::error::ExprResult;
use crate::node::ExprKind;

impl ExprArena {
    pub(crate) fn unary(&mut self, op: UnaryOp, operand: ExprId) -> ExprResult<ExprId> {
        self.build(ExprKind::Unary { op, operand })
    }

    pub(crate) fn binary(&mut self, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> ExprResult<ExprId> {
        self.build(ExprKind::Binary { op, lhs, rhs })
    }

    fn compare(&mut self, op: CompareOp, lhs: ExprId, rhs: ExprId) -> ExprResult<ExprId> {
        self.build(ExprKind::Compare { op, lhs, rhs })
    }

    pub fn add(&mut self, lhs: ExprId, rhs: ExprId) -> ExprResult<ExprId> {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn subtract(&mut self, lhs: ExprId, rhs: ExprId) -> ExprResult<ExprId> {
        self.binary(BinaryOp::Sub, lhs, rhs)
    }

    /// Product of numbers, scaling of arrays and vectors, or composition of
    /// transformations (`lhs` applied after `rhs`).
    pub fn multiply(&mut self, lhs: ExprId, rhs: ExprId) -> ExprResult<ExprId> {
        self.binary(BinaryOp::Mul, lhs, rhs)
    }

    /// Integer division by zero has no cheap value.
    pub fn divide(&mut self, lhs: ExprId, rhs: ExprId) -> ExprResult<ExprId> {
        self.binary(BinaryOp::Div, lhs, rhs)
    }

    pub fn negate(&mut self, operand: ExprId) -> ExprResult<ExprId> {
        self.unary(UnaryOp::Neg, operand)
    }

    pub fn abs(&mut self, operand: ExprId) -> ExprResult<ExprId> {
        self.unary(UnaryOp::Abs, operand)
    }

    pub fn sqrt(&mut self, operand: ExprId) -> ExprResult<ExprId> {
        self.unary(UnaryOp::Sqrt, operand)
    }

    pub fn sin(&mut self, operand: ExprId) -> ExprResult<ExprId> {
        self.unary(UnaryOp::Sin, operand)
    }

    pub fn cos(&mut self, operand: ExprId) -> ExprResult<ExprId> {
        self.unary(UnaryOp::Cos, operand)
    }

    pub fn tan(&mut self, operand: ExprId) -> ExprResult<ExprId> {
        self.unary(UnaryOp::Tan, operand)
    }

    pub fn asin(&mut self, operand: ExprId) -> ExprResult<ExprId> {
        self.unary(UnaryOp::Asin, operand)
    }

    pub fn acos(&mut self, operand: ExprId) -> ExprResult<ExprId> {
        self.unary(UnaryOp::Acos, operand)
    }

    pub fn atan(&mut self, operand: ExprId) -> ExprResult<ExprId> {
        self.unary(UnaryOp::Atan, operand)
    }

    /// Angle of the point (`x`, `y`), computed as `y.atan2(x)`.
    pub fn atan2(&mut self, y: ExprId, x: ExprId) -> ExprResult<ExprId> {
        self.binary(BinaryOp::Atan2, y, x)
    }

    pub fn min(&mut self, lhs: ExprId, rhs: ExprId) -> ExprResult<ExprId> {
        self.binary(BinaryOp::Min, lhs, rhs)
    }

    pub fn max(&mut self, lhs: ExprId, rhs: ExprId) -> ExprResult<ExprId> {
        self.binary(BinaryOp::Max, lhs, rhs)
    }

    pub fn greater(&mut self, lhs: ExprId, rhs: ExprId) -> ExprResult<ExprId> {
        self.compare(CompareOp::Greater, lhs, rhs)
    }

    pub fn greater_eq(&mut self, lhs: ExprId, rhs: ExprId) -> ExprResult<ExprId> {
        self.compare(CompareOp::GreaterEq, lhs, rhs)
    }

    pub fn less(&mut self, lhs: ExprId, rhs: ExprId) -> ExprResult<ExprId> {
        self.compare(CompareOp::Less, lhs, rhs)
    }

    pub fn less_eq(&mut self, lhs: ExprId, rhs: ExprId) -> ExprResult<ExprId> {
        self.compare(CompareOp::LessEq, lhs, rhs)
    }

    pub fn equal(&mut self, lhs: ExprId, rhs: ExprId) -> ExprResult<ExprId> {
        self.compare(CompareOp::Equal, lhs, rhs)
    }

    /// Clamp `value` into `[lower, upper]`. Constant bounds must be ordered.
    pub fn limit(&mut self, value: ExprId, lower: ExprId, upper: ExprId) -> ExprResult<ExprId> {
        self.build(ExprKind::Limit {
            value,
            lower,
            upper,
        })
    }

    pub fn to_double(&mut self, operand: ExprId) -> ExprResult<ExprId> {
        self.unary(UnaryOp::ToDouble, operand)
    }

    /// Nearest integer, halves away from zero.
    pub fn round(&mut self, operand: ExprId) -> ExprResult<ExprId> {
        self.unary(UnaryOp::Round, operand)
    }
}

#[cfg(test)]
mod tests {
    use cf_core::{DataKind, Value};

    use crate::error::ExprError;
    use crate::scope::{ContextId, Scope};

    use super::*;

    #[test]
    fn mixed_kinds_are_rejected() {
        let mut arena = ExprArena::default();
        let d = arena.double(1.0).unwrap();
        let i = arena.integer(1).unwrap();
        let err = arena.add(d, i).unwrap_err();
        assert!(matches!(err, ExprError::TypeMismatch { op: "add", .. }));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn scope_mismatch_interns_nothing() {
        let mut arena = ExprArena::default();
        let a = arena.input("a", DataKind::Double, Scope::Context(ContextId(1))).unwrap();
        let b = arena.input("b", DataKind::Double, Scope::Context(ContextId(2))).unwrap();
        let before = arena.len();
        let err = arena.subtract(a, b).unwrap_err();
        assert!(matches!(err, ExprError::ScopeMismatch { .. }));
        assert_eq!(arena.len(), before);
    }

    #[test]
    fn identities_fold_away() {
        let mut arena = ExprArena::default();
        let x = arena.sensor("x", DataKind::Double).unwrap();
        let zero = arena.double(0.0).unwrap();
        let one = arena.double(1.0).unwrap();
        assert_eq!(arena.add(x, zero).unwrap(), x);
        assert_eq!(arena.subtract(x, zero).unwrap(), x);
        assert_eq!(arena.multiply(x, one).unwrap(), x);
        assert_eq!(arena.divide(x, one).unwrap(), x);
        let n = arena.negate(x).unwrap();
        assert_eq!(arena.negate(n).unwrap(), x);
        let z = arena.multiply(x, zero).unwrap();
        assert_eq!(arena.literal(z), Some(&Value::Double(0.0)));
    }

    #[test]
    fn inverted_constant_limits_are_invalid() {
        let mut arena = ExprArena::default();
        let x = arena.sensor("x", DataKind::Double).unwrap();
        let lo = arena.double(2.0).unwrap();
        let hi = arena.double(1.0).unwrap();
        assert!(matches!(
            arena.limit(x, lo, hi),
            Err(ExprError::InvalidArg { .. })
        ));
        let limited = arena.limit(x, hi, lo).unwrap();
        assert_eq!(arena.data_kind(limited).unwrap(), DataKind::Double);
    }

    #[test]
    fn comparisons_are_boolean() {
        let mut arena = ExprArena::default();
        let a = arena.integer(3).unwrap();
        let b = arena.integer(4).unwrap();
        let lt = arena.less(a, b).unwrap();
        assert_eq!(arena.literal(lt), Some(&Value::Boolean(true)));
        let r = arena.double(2.5).unwrap();
        let rounded = arena.round(r).unwrap();
        assert_eq!(arena.literal(rounded), Some(&Value::Integer(3)));
    }
}

//! Boolean operators and selection.

use cf_core::{BinaryOp, ExprId, UnaryOp};

use crate::arena::ExprArena;
use crate::error::ExprResult;
use crate::node::ExprKind;

impl ExprArena {
    pub fn not(&mut self, operand: ExprId) -> ExprResult<ExprId> {
        self.unary(UnaryOp::Not, operand)
    }

    pub fn and(&mut self, lhs: ExprId, rhs: ExprId) -> ExprResult<ExprId> {
        self.binary(BinaryOp::And, lhs, rhs)
    }

    pub fn or(&mut self, lhs: ExprId, rhs: ExprId) -> ExprResult<ExprId> {
        self.binary(BinaryOp::Or, lhs, rhs)
    }

    pub fn xor(&mut self, lhs: ExprId, rhs: ExprId) -> ExprResult<ExprId> {
        self.binary(BinaryOp::Xor, lhs, rhs)
    }

    /// `if_true` while `condition` holds, `if_false` otherwise.
    pub fn select(
        &mut self,
        condition: ExprId,
        if_true: ExprId,
        if_false: ExprId,
    ) -> ExprResult<ExprId> {
        self.build(ExprKind::Select {
            condition,
            if_true,
            if_false,
        })
    }

    /// Conjunction of all terms; `true` for none.
    pub fn all(&mut self, terms: &[ExprId]) -> ExprResult<ExprId> {
        let mut acc = self.boolean(true)?;
        for t in terms {
            acc = self.and(acc, *t)?;
        }
        Ok(acc)
    }

    /// Disjunction of all terms; `false` for none.
    pub fn any(&mut self, terms: &[ExprId]) -> ExprResult<ExprId> {
        let mut acc = self.boolean(false)?;
        for t in terms {
            acc = self.or(acc, *t)?;
        }
        Ok(acc)
    }
}

#[cfg(test)]
mod tests {
    use cf_core::{DataKind, Value};

    use super::*;

    #[test]
    fn boolean_identities() {
        let mut arena = ExprArena::default();
        let x = arena.sensor("x", DataKind::Boolean).unwrap();
        let t = arena.boolean(true).unwrap();
        let f = arena.boolean(false).unwrap();
        assert_eq!(arena.and(x, t).unwrap(), x);
        assert_eq!(arena.or(x, f).unwrap(), x);
        assert_eq!(arena.and(f, x).unwrap(), f);
        assert_eq!(arena.or(x, t).unwrap(), t);
        let n = arena.not(x).unwrap();
        assert_eq!(arena.not(n).unwrap(), x);
    }

    #[test]
    fn constant_condition_picks_branch() {
        let mut arena = ExprArena::default();
        let a = arena.sensor("a", DataKind::Double).unwrap();
        let b = arena.sensor("b", DataKind::Double).unwrap();
        let t = arena.boolean(true).unwrap();
        assert_eq!(arena.select(t, a, b).unwrap(), a);
        let c = arena.sensor("c", DataKind::Boolean).unwrap();
        assert_eq!(arena.select(c, a, a).unwrap(), a);
        assert_ne!(arena.select(c, a, b).unwrap(), a);
    }

    #[test]
    fn empty_any_and_all() {
        let mut arena = ExprArena::default();
        let any = arena.any(&[]).unwrap();
        let all = arena.all(&[]).unwrap();
        assert_eq!(arena.literal(any), Some(&Value::Boolean(false)));
        assert_eq!(arena.literal(all), Some(&Value::Boolean(true)));
        let x = arena.sensor("x", DataKind::Boolean).unwrap();
        assert_eq!(arena.any(&[x]).unwrap(), x);
    }
}

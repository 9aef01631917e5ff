//! Constant folding and algebraic simplification.

use cf_core::{BinaryOp, ComposedKind, DataKind, ExprId, UnaryOp, Value};

use crate::arena::ExprArena;
use crate::error::ExprResult;
use crate::eval::apply_pure;
use crate::node::ExprKind;

/// Outcome of folding a kind that is about to be interned.
pub(crate) enum Folded {
    /// Intern the kind as is.
    Keep,
    /// The kind simplifies to an existing node.
    Existing(ExprId),
    /// The kind evaluates to a constant.
    Value(Value),
    /// Build this kind instead.
    Rewrite(ExprKind),
}

pub(crate) fn fold(arena: &mut ExprArena, kind: &ExprKind, data: DataKind) -> ExprResult<Folded> {
    if let Some(value) = evaluate(arena, kind) {
        return Ok(Folded::Value(value));
    }
    let folded = match kind {
        ExprKind::Unary { op, operand } => fold_unary(arena, *op, *operand),
        ExprKind::Binary { op, lhs, rhs } => fold_binary(arena, *op, *lhs, *rhs, data)?,
        ExprKind::Select {
            condition,
            if_true,
            if_false,
        } => match arena.literal(*condition).and_then(Value::as_bool) {
            Some(true) => Folded::Existing(*if_true),
            Some(false) => Folded::Existing(*if_false),
            None if if_true == if_false => Folded::Existing(*if_true),
            None => Folded::Keep,
        },
        ExprKind::Smooth { input, .. } | ExprKind::RateLimit { input, .. } => {
            if arena.literal(*input).is_some() {
                Folded::Existing(*input)
            } else {
                Folded::Keep
            }
        }
        ExprKind::Edge { input, .. } => {
            if arena.literal(*input).is_some() {
                Folded::Value(Value::Boolean(false))
            } else {
                Folded::Keep
            }
        }
        ExprKind::Index { input, index } => match &arena.node(*input)?.kind {
            ExprKind::Pack { parts }
            | ExprKind::Compose {
                kind: ComposedKind::Vector,
                parts,
            } => parts.get(*index).map_or(Folded::Keep, |p| Folded::Existing(*p)),
            _ => Folded::Keep,
        },
        _ => Folded::Keep,
    };
    Ok(folded)
}

/// All dependencies are literals and the kind is pure.
fn evaluate(arena: &ExprArena, kind: &ExprKind) -> Option<Value> {
    if kind.is_leaf() || kind.is_stateful() || matches!(kind, ExprKind::Custom(_)) {
        return None;
    }
    let args = kind
        .dependencies()
        .into_iter()
        .map(|d| arena.literal(d).cloned())
        .collect::<Option<Vec<_>>>()?;
    apply_pure(kind, &args)
}

fn fold_unary(arena: &ExprArena, op: UnaryOp, operand: ExprId) -> Folded {
    let inner = match arena.get(operand).map(|n| &n.kind) {
        Some(ExprKind::Unary { op, operand }) => Some((*op, *operand)),
        _ => None,
    };
    match (op, inner) {
        (UnaryOp::Neg, Some((UnaryOp::Neg, x))) | (UnaryOp::Not, Some((UnaryOp::Not, x))) => {
            Folded::Existing(x)
        }
        (UnaryOp::Abs, Some((UnaryOp::Abs, _))) => Folded::Existing(operand),
        (UnaryOp::Invert, Some((UnaryOp::Invert, x))) => Folded::Existing(x),
        _ => Folded::Keep,
    }
}

fn fold_binary(
    arena: &mut ExprArena,
    op: BinaryOp,
    lhs: ExprId,
    rhs: ExprId,
    data: DataKind,
) -> ExprResult<Folded> {
    let lhs_kind = arena.get(lhs).map(|n| n.data).unwrap_or(data);
    let lhs_literal = arena.literal(lhs).cloned();

    // Constants go to the right so `2 + x` and `x + 2` intern identically.
    if lhs_literal.is_some() && op.is_commutative(lhs_kind) && arena.literal(rhs).is_none() {
        return Ok(Folded::Rewrite(ExprKind::Binary { op, lhs: rhs, rhs: lhs }));
    }

    let Some(c) = arena.literal(rhs).cloned() else {
        return Ok(Folded::Keep);
    };
    let folded = match (op, &c) {
        (BinaryOp::Add | BinaryOp::Sub, c) if c.is_zero() => Folded::Existing(lhs),
        (BinaryOp::Mul | BinaryOp::Div, c) if c.is_one() => Folded::Existing(lhs),
        (BinaryOp::Mul, c) if c.is_zero() && data.is_numeric() => Folded::Value(Value::zero(data)),
        (BinaryOp::And, Value::Boolean(true)) => Folded::Existing(lhs),
        (BinaryOp::And, Value::Boolean(false)) => Folded::Value(Value::Boolean(false)),
        (BinaryOp::Or, Value::Boolean(false)) => Folded::Existing(lhs),
        (BinaryOp::Or, Value::Boolean(true)) => Folded::Value(Value::Boolean(true)),
        (BinaryOp::Xor, Value::Boolean(false)) => Folded::Existing(lhs),
        (BinaryOp::Add | BinaryOp::Mul, c) if data.is_numeric() => {
            return merge_constants(arena, op, lhs, c);
        }
        _ => Folded::Keep,
    };
    Ok(folded)
}

/// `(x op c1) op c2` becomes `x op (c1 op c2)`.
fn merge_constants(
    arena: &mut ExprArena,
    op: BinaryOp,
    lhs: ExprId,
    c2: &Value,
) -> ExprResult<Folded> {
    let (x, c1) = match arena.get(lhs).map(|n| &n.kind) {
        Some(ExprKind::Binary {
            op: inner,
            lhs: x,
            rhs: c1,
        }) if *inner == op => (*x, *c1),
        _ => return Ok(Folded::Keep),
    };
    let Some(merged) = arena
        .literal(c1)
        .and_then(|c1| cf_core::ops::apply_binary(op, c1, c2))
    else {
        return Ok(Folded::Keep);
    };
    let merged = arena.constant(merged)?;
    Ok(Folded::Rewrite(ExprKind::Binary {
        op,
        lhs: x,
        rhs: merged,
    }))
}

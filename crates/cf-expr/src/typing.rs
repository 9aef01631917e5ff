//! Data kind inference and argument validation for composite nodes.

use cf_core::ops::compose_parts;
use cf_core::{ensure_finite, DataKind, ExprId};

use crate::arena::ExprArena;
use crate::error::{ExprError, ExprResult};
use crate::node::ExprKind;

pub(crate) fn infer(arena: &ExprArena, kind: &ExprKind) -> ExprResult<DataKind> {
    let data = |id: ExprId| arena.data_kind(id);
    match kind {
        ExprKind::Unary { op, operand } => {
            let k = data(*operand)?;
            op.result_kind(k)
                .ok_or_else(|| ExprError::type_mismatch(op.name(), &[k]))
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let (l, r) = (data(*lhs)?, data(*rhs)?);
            op.result_kind(l, r)
                .ok_or_else(|| ExprError::type_mismatch(op.name(), &[l, r]))
        }
        ExprKind::Compare { op, lhs, rhs } => {
            let (l, r) = (data(*lhs)?, data(*rhs)?);
            op.result_kind(l, r)
                .ok_or_else(|| ExprError::type_mismatch(op.name(), &[l, r]))
        }
        ExprKind::Select {
            condition,
            if_true,
            if_false,
        } => {
            let (c, t, f) = (data(*condition)?, data(*if_true)?, data(*if_false)?);
            if c != DataKind::Boolean || t != f {
                return Err(ExprError::type_mismatch("select", &[c, t, f]));
            }
            Ok(t)
        }
        ExprKind::Limit {
            value,
            lower,
            upper,
        } => {
            let (v, lo, hi) = (data(*value)?, data(*lower)?, data(*upper)?);
            if !v.is_numeric() || lo != v || hi != v {
                return Err(ExprError::type_mismatch("limit", &[v, lo, hi]));
            }
            if let (Some(lo), Some(hi)) = (arena.literal(*lower), arena.literal(*upper)) {
                let inverted = match (lo.as_double(), hi.as_double()) {
                    (Some(lo), Some(hi)) => lo > hi,
                    _ => lo.as_integer() > hi.as_integer(),
                };
                if inverted {
                    return Err(ExprError::invalid(format!(
                        "limit lower bound {lo} exceeds upper bound {hi}"
                    )));
                }
            }
            Ok(v)
        }
        ExprKind::Smooth {
            input,
            time_constant,
        } => {
            let k = data(*input)?;
            if k != DataKind::Double {
                return Err(ExprError::type_mismatch("smooth", &[k]));
            }
            let tc = ensure_finite(time_constant.get(), "smoothing time constant")?;
            if tc <= 0.0 {
                return Err(ExprError::invalid("smoothing time constant must be positive"));
            }
            Ok(k)
        }
        ExprKind::RateLimit { input, max_rate } => {
            let k = data(*input)?;
            if k != DataKind::Double {
                return Err(ExprError::type_mismatch("rate_limit", &[k]));
            }
            let rate = ensure_finite(max_rate.get(), "rate limit")?;
            if rate <= 0.0 {
                return Err(ExprError::invalid("rate limit must be positive"));
            }
            Ok(k)
        }
        ExprKind::Pre { input, initial } => {
            let k = data(*input)?;
            if initial.kind() != k {
                return Err(ExprError::type_mismatch("pre", &[k, initial.kind()]));
            }
            Ok(k)
        }
        ExprKind::Edge { input, .. } => {
            let k = data(*input)?;
            if k != DataKind::Boolean {
                return Err(ExprError::type_mismatch("edge", &[k]));
            }
            Ok(k)
        }
        ExprKind::Pack { parts } => {
            if parts.is_empty() {
                return Err(ExprError::invalid("pack needs at least one element"));
            }
            let kinds = parts.iter().map(|p| data(*p)).collect::<ExprResult<Vec<_>>>()?;
            if kinds.iter().any(|k| *k != DataKind::Double) {
                return Err(ExprError::type_mismatch("pack", &kinds));
            }
            Ok(DataKind::DoubleArray(parts.len()))
        }
        ExprKind::Index { input, index } => {
            let k = data(*input)?;
            let (Some(len), Some(element)) = (k.len(), k.element()) else {
                return Err(ExprError::type_mismatch("index", &[k]));
            };
            if *index >= len {
                return Err(ExprError::IndexOutOfBounds { index: *index, len });
            }
            Ok(element)
        }
        ExprKind::Compose { kind, parts } => {
            let kinds = parts.iter().map(|p| data(*p)).collect::<ExprResult<Vec<_>>>()?;
            if kinds.as_slice() != compose_parts(*kind) {
                return Err(ExprError::type_mismatch("compose", &kinds));
            }
            Ok(DataKind::Composed(*kind))
        }
        ExprKind::Custom(c) => {
            for dep in &c.dependencies {
                data(*dep)?;
            }
            Ok(c.data)
        }
        leaf => Err(ExprError::invalid(format!(
            "leaf kind '{}' carries its own data kind",
            leaf.type_name()
        ))),
    }
}

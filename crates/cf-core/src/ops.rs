//! Primitive operator vocabulary.
//!
//! The same operators appear as expression node kinds and as network
//! primitives. Typing (`*_kind`) and evaluation (`apply_*`) live here so host
//! side evaluation and the reference simulator agree bit for bit.

use core::fmt;

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::value::{ComposedKind, DataKind, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UnaryOp {
    Neg,
    Abs,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Not,
    /// Euclidean length of a vector.
    Norm,
    /// Inverse of a transformation.
    Invert,
    ToDouble,
    Round,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    Atan2,
    And,
    Or,
    Xor,
    Dot,
    Cross,
    /// Transformation applied to a vector.
    Apply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CompareOp {
    Greater,
    GreaterEq,
    Less,
    LessEq,
    Equal,
}

/// Signals provided by the executor's cycle clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ClockSignal {
    /// Seconds since the network was started.
    Time,
    /// Length of the current cycle in seconds.
    Period,
}

impl UnaryOp {
    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Abs => "abs",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
            UnaryOp::Tan => "tan",
            UnaryOp::Asin => "asin",
            UnaryOp::Acos => "acos",
            UnaryOp::Atan => "atan",
            UnaryOp::Not => "not",
            UnaryOp::Norm => "norm",
            UnaryOp::Invert => "invert",
            UnaryOp::ToDouble => "to_double",
            UnaryOp::Round => "round",
        }
    }

    /// Result kind for an operand kind, `None` if the operator does not apply.
    pub fn result_kind(self, operand: DataKind) -> Option<DataKind> {
        use DataKind::*;
        match (self, operand) {
            (UnaryOp::Neg, Double | Integer | DoubleArray(_)) => Some(operand),
            (UnaryOp::Neg, Composed(ComposedKind::Vector)) => Some(operand),
            (UnaryOp::Abs, Double | Integer) => Some(operand),
            (
                UnaryOp::Sqrt
                | UnaryOp::Sin
                | UnaryOp::Cos
                | UnaryOp::Tan
                | UnaryOp::Asin
                | UnaryOp::Acos
                | UnaryOp::Atan,
                Double,
            ) => Some(Double),
            (UnaryOp::Not, Boolean) => Some(Boolean),
            (UnaryOp::Norm, Composed(ComposedKind::Vector)) => Some(Double),
            (UnaryOp::Invert, Composed(ComposedKind::Transform)) => Some(operand),
            (UnaryOp::ToDouble, Integer) => Some(Double),
            (UnaryOp::Round, Double) => Some(Integer),
            _ => None,
        }
    }
}

impl BinaryOp {
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Min => "min",
            BinaryOp::Max => "max",
            BinaryOp::Atan2 => "atan2",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Dot => "dot",
            BinaryOp::Cross => "cross",
            BinaryOp::Apply => "apply",
        }
    }

    /// Operand order does not matter for the result.
    pub fn is_commutative(self, kind: DataKind) -> bool {
        match self {
            BinaryOp::Add
            | BinaryOp::Min
            | BinaryOp::Max
            | BinaryOp::And
            | BinaryOp::Or
            | BinaryOp::Xor
            | BinaryOp::Dot => true,
            // Composition of transformations is not commutative.
            BinaryOp::Mul => kind.is_numeric(),
            _ => false,
        }
    }

    pub fn result_kind(self, lhs: DataKind, rhs: DataKind) -> Option<DataKind> {
        use DataKind::*;
        const V: DataKind = DataKind::VECTOR;
        const T: DataKind = DataKind::TRANSFORM;
        match self {
            BinaryOp::Add | BinaryOp::Sub => match (lhs, rhs) {
                (Double, Double) | (Integer, Integer) => Some(lhs),
                (DoubleArray(a), DoubleArray(b)) if a == b => Some(lhs),
                (l, r) if l == V && r == V => Some(V),
                _ => None,
            },
            BinaryOp::Mul => match (lhs, rhs) {
                (Double, Double) | (Integer, Integer) => Some(lhs),
                (DoubleArray(_), Double) => Some(lhs),
                (l, Double) if l == V => Some(V),
                (l, r) if l == T && r == T => Some(T),
                _ => None,
            },
            BinaryOp::Div => match (lhs, rhs) {
                (Double, Double) | (Integer, Integer) => Some(lhs),
                (DoubleArray(_), Double) => Some(lhs),
                (l, Double) if l == V => Some(V),
                _ => None,
            },
            BinaryOp::Min | BinaryOp::Max => match (lhs, rhs) {
                (Double, Double) | (Integer, Integer) => Some(lhs),
                _ => None,
            },
            BinaryOp::Atan2 => (lhs == Double && rhs == Double).then_some(Double),
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
                (lhs == Boolean && rhs == Boolean).then_some(Boolean)
            }
            BinaryOp::Dot => (lhs == V && rhs == V).then_some(Double),
            BinaryOp::Cross => (lhs == V && rhs == V).then_some(V),
            BinaryOp::Apply => (lhs == T && rhs == V).then_some(V),
        }
    }
}

impl CompareOp {
    pub fn name(self) -> &'static str {
        match self {
            CompareOp::Greater => "greater",
            CompareOp::GreaterEq => "greater_eq",
            CompareOp::Less => "less",
            CompareOp::LessEq => "less_eq",
            CompareOp::Equal => "equal",
        }
    }

    pub fn result_kind(self, lhs: DataKind, rhs: DataKind) -> Option<DataKind> {
        if lhs != rhs {
            return None;
        }
        match (self, lhs) {
            (_, DataKind::Double | DataKind::Integer) => Some(DataKind::Boolean),
            (CompareOp::Equal, DataKind::Boolean) => Some(DataKind::Boolean),
            _ => None,
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Evaluate a unary operator. `None` if the operand kind does not fit.
pub fn apply_unary(op: UnaryOp, x: &Value) -> Option<Value> {
    use Value::*;
    let out = match (op, x) {
        (UnaryOp::Neg, Double(v)) => Double(-v),
        (UnaryOp::Neg, Integer(v)) => Integer(v.wrapping_neg()),
        (UnaryOp::Neg, DoubleArray(v)) => DoubleArray(v.iter().map(|e| -e).collect()),
        (UnaryOp::Neg, Vector(v)) => Vector(-*v),
        (UnaryOp::Abs, Double(v)) => Double(v.abs()),
        (UnaryOp::Abs, Integer(v)) => Integer(v.wrapping_abs()),
        (UnaryOp::Sqrt, Double(v)) => Double(v.sqrt()),
        (UnaryOp::Sin, Double(v)) => Double(v.sin()),
        (UnaryOp::Cos, Double(v)) => Double(v.cos()),
        (UnaryOp::Tan, Double(v)) => Double(v.tan()),
        (UnaryOp::Asin, Double(v)) => Double(v.asin()),
        (UnaryOp::Acos, Double(v)) => Double(v.acos()),
        (UnaryOp::Atan, Double(v)) => Double(v.atan()),
        (UnaryOp::Not, Boolean(v)) => Boolean(!v),
        (UnaryOp::Norm, Vector(v)) => Double(v.norm()),
        (UnaryOp::Invert, Transform(t)) => Transform(t.inverse()),
        (UnaryOp::ToDouble, Integer(v)) => Double(*v as f64),
        (UnaryOp::Round, Double(v)) => Integer(v.round() as i64),
        _ => return None,
    };
    Some(out)
}

/// Evaluate a binary operator. `None` if the operand kinds do not fit or an
/// integer division by zero is requested.
pub fn apply_binary(op: BinaryOp, a: &Value, b: &Value) -> Option<Value> {
    use Value::*;
    let out = match (op, a, b) {
        (BinaryOp::Add, Double(x), Double(y)) => Double(x + y),
        (BinaryOp::Add, Integer(x), Integer(y)) => Integer(x.wrapping_add(*y)),
        (BinaryOp::Add, DoubleArray(x), DoubleArray(y)) if x.len() == y.len() => {
            DoubleArray(x.iter().zip(y).map(|(p, q)| p + q).collect())
        }
        (BinaryOp::Add, Vector(x), Vector(y)) => Vector(*x + *y),
        (BinaryOp::Sub, Double(x), Double(y)) => Double(x - y),
        (BinaryOp::Sub, Integer(x), Integer(y)) => Integer(x.wrapping_sub(*y)),
        (BinaryOp::Sub, DoubleArray(x), DoubleArray(y)) if x.len() == y.len() => {
            DoubleArray(x.iter().zip(y).map(|(p, q)| p - q).collect())
        }
        (BinaryOp::Sub, Vector(x), Vector(y)) => Vector(*x - *y),
        (BinaryOp::Mul, Double(x), Double(y)) => Double(x * y),
        (BinaryOp::Mul, Integer(x), Integer(y)) => Integer(x.wrapping_mul(*y)),
        (BinaryOp::Mul, DoubleArray(x), Double(y)) => DoubleArray(x.iter().map(|p| p * y).collect()),
        (BinaryOp::Mul, Vector(x), Double(y)) => Vector(*x * *y),
        (BinaryOp::Mul, Transform(x), Transform(y)) => Transform(*x * *y),
        (BinaryOp::Div, Double(x), Double(y)) => Double(x / y),
        (BinaryOp::Div, Integer(x), Integer(y)) => Integer(x.checked_div(*y)?),
        (BinaryOp::Div, DoubleArray(x), Double(y)) => DoubleArray(x.iter().map(|p| p / y).collect()),
        (BinaryOp::Div, Vector(x), Double(y)) => Vector(*x / *y),
        (BinaryOp::Min, Double(x), Double(y)) => Double(x.min(*y)),
        (BinaryOp::Min, Integer(x), Integer(y)) => Integer(*x.min(y)),
        (BinaryOp::Max, Double(x), Double(y)) => Double(x.max(*y)),
        (BinaryOp::Max, Integer(x), Integer(y)) => Integer(*x.max(y)),
        (BinaryOp::Atan2, Double(x), Double(y)) => Double(x.atan2(*y)),
        (BinaryOp::And, Boolean(x), Boolean(y)) => Boolean(*x && *y),
        (BinaryOp::Or, Boolean(x), Boolean(y)) => Boolean(*x || *y),
        (BinaryOp::Xor, Boolean(x), Boolean(y)) => Boolean(*x ^ *y),
        (BinaryOp::Dot, Vector(x), Vector(y)) => Double(x.dot(y)),
        (BinaryOp::Cross, Vector(x), Vector(y)) => Vector(x.cross(y)),
        (BinaryOp::Apply, Transform(t), Vector(v)) => Vector(t.transform_point(&Point3::from(*v)).coords),
        _ => return None,
    };
    Some(out)
}

pub fn apply_compare(op: CompareOp, a: &Value, b: &Value) -> Option<Value> {
    use core::cmp::Ordering;
    let ordering = match (a, b) {
        (Value::Double(x), Value::Double(y)) => x.partial_cmp(y),
        (Value::Integer(x), Value::Integer(y)) => Some(x.cmp(y)),
        (Value::Boolean(x), Value::Boolean(y)) if op == CompareOp::Equal => Some(x.cmp(y)),
        _ => return None,
    };
    // NaN compares false for every operator.
    let result = match (op, ordering) {
        (_, None) => false,
        (CompareOp::Greater, Some(o)) => o == Ordering::Greater,
        (CompareOp::GreaterEq, Some(o)) => o != Ordering::Less,
        (CompareOp::Less, Some(o)) => o == Ordering::Less,
        (CompareOp::LessEq, Some(o)) => o != Ordering::Greater,
        (CompareOp::Equal, Some(o)) => o == Ordering::Equal,
    };
    Some(Value::Boolean(result))
}

/// Clamp a numeric value into `[lower, upper]`.
pub fn apply_limit(value: &Value, lower: &Value, upper: &Value) -> Option<Value> {
    match (value, lower, upper) {
        (Value::Double(v), Value::Double(lo), Value::Double(hi)) => {
            Some(Value::Double(v.max(*lo).min(*hi)))
        }
        (Value::Integer(v), Value::Integer(lo), Value::Integer(hi)) => {
            Some(Value::Integer((*v).max(*lo).min(*hi)))
        }
        _ => None,
    }
}

/// Element `index` of an indexable value.
pub fn apply_index(value: &Value, index: usize) -> Option<Value> {
    match value {
        Value::DoubleArray(v) => v.get(index).map(|e| Value::Double(*e)),
        Value::Vector(v) => (index < 3).then(|| Value::Double(v[index])),
        Value::Transform(t) => match index {
            0 => Some(Value::Vector(t.translation.vector)),
            1 => {
                let (r, p, y) = t.rotation.euler_angles();
                Some(Value::Vector(Vector3::new(r, p, y)))
            }
            _ => None,
        },
        _ => None,
    }
}

/// Array of doubles from scalar parts.
pub fn apply_pack(parts: &[Value]) -> Option<Value> {
    parts
        .iter()
        .map(Value::as_double)
        .collect::<Option<Vec<_>>>()
        .map(Value::DoubleArray)
}

/// Composed value from its parts: a vector from three doubles, a
/// transformation from a translation vector and a roll/pitch/yaw vector.
pub fn apply_compose(kind: ComposedKind, parts: &[Value]) -> Option<Value> {
    match (kind, parts) {
        (ComposedKind::Vector, [x, y, z]) => Some(Value::Vector(Vector3::new(
            x.as_double()?,
            y.as_double()?,
            z.as_double()?,
        ))),
        (ComposedKind::Transform, [t, r]) => {
            let t = t.as_vector()?;
            let r = r.as_vector()?;
            Some(Value::Transform(Isometry3::from_parts(
                Translation3::from(t),
                UnitQuaternion::from_euler_angles(r.x, r.y, r.z),
            )))
        }
        _ => None,
    }
}

/// Kinds of the parts a composed value is built from.
pub fn compose_parts(kind: ComposedKind) -> &'static [DataKind] {
    match kind {
        ComposedKind::Vector => &[DataKind::Double, DataKind::Double, DataKind::Double],
        ComposedKind::Transform => &[DataKind::VECTOR, DataKind::VECTOR],
    }
}

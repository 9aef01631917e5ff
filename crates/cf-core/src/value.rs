//! Dataflow value kinds and values.
//!
//! Every port in a compiled network carries one [`DataKind`]; every expression
//! node evaluates to a [`Value`] of its kind.

use core::fmt;
use core::hash::{Hash, Hasher};

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::numeric::canonical_bits;

/// Struct-like value kinds made of several doubles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ComposedKind {
    /// Three-component vector.
    Vector,
    /// Rigid transformation (translation + rotation).
    Transform,
}

/// Tag of a dataflow value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DataKind {
    Double,
    Boolean,
    Integer,
    /// Fixed-length array of doubles.
    DoubleArray(usize),
    Composed(ComposedKind),
}

impl DataKind {
    pub const VECTOR: DataKind = DataKind::Composed(ComposedKind::Vector);
    pub const TRANSFORM: DataKind = DataKind::Composed(ComposedKind::Transform);

    /// Number of addressable elements for indexing, if the kind is indexable.
    pub fn len(self) -> Option<usize> {
        match self {
            DataKind::DoubleArray(n) => Some(n),
            DataKind::Composed(ComposedKind::Vector) => Some(3),
            DataKind::Composed(ComposedKind::Transform) => Some(2),
            _ => None,
        }
    }

    /// Kind of the element returned by indexing.
    pub fn element(self) -> Option<DataKind> {
        match self {
            DataKind::DoubleArray(_) | DataKind::Composed(ComposedKind::Vector) => {
                Some(DataKind::Double)
            }
            DataKind::Composed(ComposedKind::Transform) => Some(DataKind::VECTOR),
            _ => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, DataKind::Double | DataKind::Integer)
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataKind::Double => write!(f, "double"),
            DataKind::Boolean => write!(f, "boolean"),
            DataKind::Integer => write!(f, "integer"),
            DataKind::DoubleArray(n) => write!(f, "double[{n}]"),
            DataKind::Composed(ComposedKind::Vector) => write!(f, "vector"),
            DataKind::Composed(ComposedKind::Transform) => write!(f, "transform"),
        }
    }
}

/// A dataflow value.
///
/// Equality and hashing are bitwise on canonicalized floats, so values can
/// serve as keys for structural interning (`NaN == NaN`, `0.0 == -0.0`).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    Double(f64),
    Boolean(bool),
    Integer(i64),
    DoubleArray(Vec<f64>),
    Vector(Vector3<f64>),
    Transform(Isometry3<f64>),
}

impl Value {
    pub fn kind(&self) -> DataKind {
        match self {
            Value::Double(_) => DataKind::Double,
            Value::Boolean(_) => DataKind::Boolean,
            Value::Integer(_) => DataKind::Integer,
            Value::DoubleArray(v) => DataKind::DoubleArray(v.len()),
            Value::Vector(_) => DataKind::VECTOR,
            Value::Transform(_) => DataKind::TRANSFORM,
        }
    }

    /// Neutral value of a kind, used for unset inputs and initial delay state.
    pub fn zero(kind: DataKind) -> Self {
        match kind {
            DataKind::Double => Value::Double(0.0),
            DataKind::Boolean => Value::Boolean(false),
            DataKind::Integer => Value::Integer(0),
            DataKind::DoubleArray(n) => Value::DoubleArray(vec![0.0; n]),
            DataKind::Composed(ComposedKind::Vector) => Value::Vector(Vector3::zeros()),
            DataKind::Composed(ComposedKind::Transform) => Value::Transform(Isometry3::identity()),
        }
    }

    /// Transformation from a translation and roll/pitch/yaw angles.
    pub fn transform(translation: Vector3<f64>, rpy: Vector3<f64>) -> Self {
        Value::Transform(Isometry3::from_parts(
            Translation3::from(translation),
            UnitQuaternion::from_euler_angles(rpy.x, rpy.y, rpy.z),
        ))
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<Vector3<f64>> {
        match self {
            Value::Vector(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_transform(&self) -> Option<Isometry3<f64>> {
        match self {
            Value::Transform(t) => Some(*t),
            _ => None,
        }
    }

    /// True for the additive identity of numeric kinds.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Double(v) => *v == 0.0,
            Value::Integer(v) => *v == 0,
            _ => false,
        }
    }

    /// True for the multiplicative identity of numeric kinds.
    pub fn is_one(&self) -> bool {
        match self {
            Value::Double(v) => *v == 1.0,
            Value::Integer(v) => *v == 1,
            _ => false,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Value::Double(_) => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) => 2,
            Value::DoubleArray(_) => 3,
            Value::Vector(_) => 4,
            Value::Transform(_) => 5,
        }
    }

    fn bits(&self) -> Vec<u64> {
        match self {
            Value::Double(v) => vec![canonical_bits(*v)],
            Value::Boolean(v) => vec![u64::from(*v)],
            Value::Integer(v) => vec![*v as u64],
            Value::DoubleArray(v) => v.iter().map(|x| canonical_bits(*x)).collect(),
            Value::Vector(v) => v.iter().map(|x| canonical_bits(*x)).collect(),
            Value::Transform(t) => t
                .translation
                .vector
                .iter()
                .chain(t.rotation.coords.iter())
                .map(|x| canonical_bits(*x))
                .collect(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.tag() == other.tag() && self.bits() == other.bits()
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tag().hash(state);
        self.bits().hash(state);
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<Vector3<f64>> for Value {
    fn from(v: Vector3<f64>) -> Self {
        Value::Vector(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Double(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::DoubleArray(v) => write!(f, "{v:?}"),
            Value::Vector(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            Value::Transform(t) => {
                let p = t.translation.vector;
                let (r, pi, y) = t.rotation.euler_angles();
                write!(f, "[({}, {}, {}) rpy({}, {}, {})]", p.x, p.y, p.z, r, pi, y)
            }
        }
    }
}

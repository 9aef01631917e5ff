use crate::CoreError;

/// Floating point type used throughout system
pub type Real = f64;

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Bit pattern of a float with `-0.0` folded into `0.0` and every NaN collapsed.
///
/// Used wherever floats take part in structural equality and hashing.
pub fn canonical_bits(v: Real) -> u64 {
    if v == 0.0 {
        0.0_f64.to_bits()
    } else if v.is_nan() {
        Real::NAN.to_bits()
    } else {
        v.to_bits()
    }
}

/// Float wrapper with bitwise (canonical) equality, usable as a hash key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FloatKey(u64);

impl FloatKey {
    pub fn new(v: Real) -> Self {
        Self(canonical_bits(v))
    }

    pub fn get(self) -> Real {
        Real::from_bits(self.0)
    }
}

impl From<Real> for FloatKey {
    fn from(v: Real) -> Self {
        Self::new(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
    }

    #[test]
    fn float_key_folds_signed_zero() {
        assert_eq!(FloatKey::new(0.0), FloatKey::new(-0.0));
        assert_eq!(FloatKey::new(f64::NAN), FloatKey::new(-f64::NAN));
        assert_ne!(FloatKey::new(1.0), FloatKey::new(-1.0));
        assert_eq!(FloatKey::new(2.5).get(), 2.5);
    }
}

//! Fixed-point math utilities for deterministic simulation.
//!
//! Tile coordinates are plain integers; anything expressed in pixel space
//! (movement targets, overlay offsets) uses fixed-point arithmetic so that
//! every server and replay produces bit-identical state.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Fixed-point 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from integer components.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Multiply both components by a scalar, or `None` on overflow.
    #[must_use]
    pub fn checked_scale(self, factor: Fixed) -> Option<Self> {
        Some(Self::new(
            self.x.checked_mul(factor)?,
            self.y.checked_mul(factor)?,
        ))
    }
}

/// Convert a whole-number percentage into a fixed-point ratio (30 -> 0.3).
#[must_use]
pub fn percent(value: u32) -> Fixed {
    Fixed::from_num(value) / Fixed::from_num(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ints_scale() {
        let v = Vec2Fixed::from_ints(3, 2).checked_scale(Fixed::from_num(32));
        assert_eq!(v, Some(Vec2Fixed::from_ints(96, 64)));
    }

    #[test]
    fn test_scale_overflow_is_none() {
        let v = Vec2Fixed::from_ints(i32::MAX, 1);
        assert_eq!(v.checked_scale(Fixed::from_num(2)), None);
    }

    #[test]
    fn test_fixed_determinism() {
        // Same operations must produce identical results
        let a = Fixed::from_num(1) / Fixed::from_num(3);
        let b = Fixed::from_num(1) / Fixed::from_num(3);
        assert_eq!(a, b);

        let result1 = a * Fixed::from_num(7);
        let result2 = b * Fixed::from_num(7);
        assert_eq!(result1, result2);
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(50), Fixed::from_num(0.5));
        assert_eq!(percent(100), Fixed::from_num(1));
    }
}

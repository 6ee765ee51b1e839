//! Scale and level metadata carried by every value of the circuit.
//!
//! A [`ScaleLevel`] never changes in place; every operation returns a fresh value and enforces
//! the legality rules of the leveled scheme (matching levels for multiplication, matching levels
//! and scales for addition, at least one level after a rescale).
use crate::error::{PackError, Result};
use crate::math::primes::PrimeChain;
use num::{BigInt, BigRational, One, Signed, ToPrimitive};
use std::fmt::{Display, Formatter};

/// An exact positive rational scale.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scale(BigRational);

impl Scale {
    pub fn from_integer(value: u64) -> Self {
        Scale(BigRational::from_integer(BigInt::from(value)))
    }

    /// `2^bits`.
    pub fn pow2(bits: usize) -> Self {
        Scale(BigRational::from_integer(BigInt::one() << bits))
    }

    pub fn from_ratio(numer: u64, denom: u64) -> Result<Self> {
        if denom == 0 {
            return Err(PackError::InvalidScale(format!("{}/0", numer)));
        }
        Ok(Scale(BigRational::new(BigInt::from(numer), BigInt::from(denom))))
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_positive()
    }

    /// Nearest `f64`; the value handed to the evaluation engine alongside each operand.
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(f64::INFINITY)
    }

    pub fn times(&self, other: &Scale) -> Scale {
        Scale(&self.0 * &other.0)
    }

    pub fn div_prime(&self, prime: u64) -> Scale {
        Scale(&self.0 / BigRational::from_integer(BigInt::from(prime)))
    }
}

impl Display for Scale {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScaleLevel {
    scale: Scale,
    level: usize,
}

impl ScaleLevel {
    pub fn new(scale: Scale, level: usize) -> Result<Self> {
        if level == 0 {
            return Err(PackError::InvalidLevel { level });
        }
        if !scale.is_positive() {
            return Err(PackError::InvalidScale(scale.to_string()));
        }
        Ok(Self { scale, level })
    }

    pub fn scale(&self) -> &Scale {
        &self.scale
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// Divides the scale by `primes[level - 1]` and drops one level.
    pub fn rescale(&self, primes: &PrimeChain) -> Result<Self> {
        if self.level == 1 {
            return Err(PackError::InvalidLevel { level: 0 });
        }
        let prime = primes.at_level(self.level)?;
        Self::new(self.scale.div_prime(prime), self.level - 1)
    }

    /// Slot-wise product. The level is kept; callers rescale explicitly.
    pub fn multiply(&self, other: &ScaleLevel) -> Result<Self> {
        if self.level != other.level {
            return Err(PackError::LevelMismatch {
                lhs: self.level,
                rhs: other.level,
            });
        }
        Self::new(self.scale.times(&other.scale), self.level)
    }

    pub fn add(&self, other: &ScaleLevel) -> Result<Self> {
        if self.level != other.level {
            return Err(PackError::LevelMismatch {
                lhs: self.level,
                rhs: other.level,
            });
        }
        if self.scale != other.scale {
            return Err(PackError::ScaleMismatch {
                lhs: self.scale.to_string(),
                rhs: other.scale.to_string(),
            });
        }
        Self::new(self.scale.clone(), self.level)
    }

    /// Metadata of a rotated value. Rotation leaves both scale and level untouched.
    pub fn after_rotation(&self) -> Self {
        self.clone()
    }
}

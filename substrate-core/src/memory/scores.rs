use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};

/// A real number clamped to `[0.0, 1.0]` on construction. Used for both
/// `importance` and `confidence` so the two never silently diverge from
/// their shared invariant.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitScore(f64);

impl UnitScore {
    pub const MIN: UnitScore = UnitScore(0.0);
    pub const MAX: UnitScore = UnitScore(1.0);

    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for UnitScore {
    fn default() -> Self {
        Self(0.5)
    }
}

impl From<f64> for UnitScore {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl Add for UnitScore {
    type Output = UnitScore;
    fn add(self, rhs: Self) -> Self::Output {
        UnitScore::new(self.0 + rhs.0)
    }
}

impl Sub for UnitScore {
    type Output = UnitScore;
    fn sub(self, rhs: Self) -> Self::Output {
        UnitScore::new(self.0 - rhs.0)
    }
}

impl Mul<f64> for UnitScore {
    type Output = UnitScore;
    fn mul(self, rhs: f64) -> Self::Output {
        UnitScore::new(self.0 * rhs)
    }
}

impl fmt::Display for UnitScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

/// How much weight a memory should carry in ranking and consolidation.
pub type Importance = UnitScore;

/// How sure the system is that a memory is accurate and current.
pub type Confidence = UnitScore;

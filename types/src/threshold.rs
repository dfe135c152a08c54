//! Validated ratio thresholds.
//!
//! Every gate in the workspace (coherence, corruption, recovery floor) compares
//! a score in `[0, 1]` against a [`Threshold`]. Holding a `Threshold` means the
//! value is finite and inside the unit interval.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("threshold must be a finite value in [0, 1], got {0}")]
pub struct ThresholdError(pub f64);

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Threshold(f64);

impl Threshold {
    /// Minimum bitwise agreement for two encodings to count as authentic.
    pub const COHERENCE: Threshold = Threshold(0.954);
    /// Corruption probability above which reconstruction is attempted.
    pub const CORRUPTION: Threshold = Threshold(0.7);
    /// Minimum recovery confidence accepted without raising a failure.
    pub const RECOVERY_FLOOR: Threshold = Threshold(0.95);

    pub fn new(value: f64) -> Result<Self, ThresholdError> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ThresholdError(value))
        }
    }

    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// `score >= threshold`.
    #[must_use]
    pub fn is_met_by(self, score: f64) -> bool {
        score >= self.0
    }

    /// `score > threshold`.
    #[must_use]
    pub fn is_exceeded_by(self, score: f64) -> bool {
        score > self.0
    }
}

impl TryFrom<f64> for Threshold {
    type Error = ThresholdError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Threshold> for f64 {
    fn from(value: Threshold) -> Self {
        value.0
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

//! Isotonic calibration table.
//!
//! Maps a raw model probability onto the calibrated scale by linear
//! interpolation between fitted breakpoints, clamped at both ends.

use serde::{Deserialize, Serialize};

use crate::ports::ModelError;

/// Piecewise-linear monotone map fitted by isotonic regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsotonicCalibration {
    /// Breakpoints, strictly increasing.
    pub x: Vec<f64>,
    /// Calibrated outputs, non-decreasing, in [0, 1].
    pub y: Vec<f64>,
}

impl IsotonicCalibration {
    /// # Errors
    /// Returns `ModelError::InvalidArtifact` if the table is not monotone.
    pub fn validate(&self) -> Result<(), ModelError> {
        let invalid = |msg: &str| Err(ModelError::InvalidArtifact(format!("calibration: {msg}")));
        if self.x.len() < 2 || self.x.len() != self.y.len() {
            return invalid("needs at least two (x, y) pairs of equal length");
        }
        if self.x.iter().chain(&self.y).any(|v| !v.is_finite()) {
            return invalid("non-finite breakpoint");
        }
        if self.x.windows(2).any(|w| w[1] <= w[0]) {
            return invalid("x must be strictly increasing");
        }
        if self.y.windows(2).any(|w| w[1] < w[0]) {
            return invalid("y must be non-decreasing");
        }
        if self.y.iter().any(|v| !(0.0..=1.0).contains(v)) {
            return invalid("y must lie in [0, 1]");
        }
        Ok(())
    }

    /// Calibrated value for `p`.
    #[must_use]
    pub fn apply(&self, p: f64) -> f64 {
        let (Some(&x0), Some(&xn), Some(&y0), Some(&yn)) =
            (self.x.first(), self.x.last(), self.y.first(), self.y.last())
        else {
            return p;
        };
        if p <= x0 {
            return y0;
        }
        if p >= xn {
            return yn;
        }
        // First breakpoint strictly above p; p > x0 so idx >= 1.
        let idx = self.x.partition_point(|x| *x <= p);
        let (xa, xb) = (self.x[idx - 1], self.x[idx]);
        let (ya, yb) = (self.y[idx - 1], self.y[idx]);
        ya + (yb - ya) * (p - xa) / (xb - xa)
    }
}

//! Logistic regression over scaled features.

use serde::{Deserialize, Serialize};

use super::calibration::IsotonicCalibration;
use super::sigmoid;
use crate::ports::ModelError;

/// Fitted logistic model: `sigmoid(w . x + b)`, optionally calibrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration: Option<IsotonicCalibration>,
}

impl LogisticModel {
    /// # Errors
    /// Returns `ModelError::InvalidArtifact` on empty or non-finite parameters.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.coefficients.is_empty() {
            return Err(ModelError::InvalidArtifact(
                "logistic model has no coefficients".into(),
            ));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|w| !w.is_finite()) {
            return Err(ModelError::InvalidArtifact(
                "logistic model has non-finite parameters".into(),
            ));
        }
        if let Some(cal) = &self.calibration {
            cal.validate()?;
        }
        Ok(())
    }

    /// Linear score `w . x + b`.
    #[must_use]
    pub fn logit(&self, scaled: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(scaled)
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }

    #[must_use]
    pub fn probability(&self, scaled: &[f64]) -> f64 {
        let p = sigmoid(self.logit(scaled));
        match &self.calibration {
            Some(cal) => cal.apply(p),
            None => p,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_probability() {
        let model = LogisticModel {
            coefficients: vec![1.0, -2.0],
            intercept: 0.5,
            calibration: None,
        };
        assert_relative_eq!(model.logit(&[1.0, 0.25]), 1.0);
        assert_relative_eq!(model.probability(&[0.0, 0.25]), 0.5);
    }

    #[test]
    fn test_calibration_is_applied() {
        let model = LogisticModel {
            coefficients: vec![0.0],
            intercept: 0.0,
            calibration: Some(IsotonicCalibration {
                x: vec![0.0, 1.0],
                y: vec![0.0, 0.5],
            }),
        };
        assert_relative_eq!(model.probability(&[3.0]), 0.25);
    }

    #[test]
    fn test_validation() {
        let model = LogisticModel {
            coefficients: vec![f64::INFINITY],
            intercept: 0.0,
            calibration: None,
        };
        assert!(model.validate().is_err());
    }
}

//! Classifier adapters: fitted models loaded from flat JSON.
//!
//! `classifier.json` carries a `version` and a `kind` tag selecting the model
//! family; the remaining keys are the family's parameters.

mod calibration;
mod logistic;
mod trees;

use serde::{Deserialize, Serialize};

pub use calibration::IsotonicCalibration;
pub use logistic::LogisticModel;
pub use trees::{RegressionTree, TreeEnsemble, TreeNode};

use crate::ports::{Classifier, ModelError};

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Supported model families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedClassifier {
    Logistic(LogisticModel),
    TreeEnsemble(TreeEnsemble),
}

impl FittedClassifier {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Logistic(_) => "logistic",
            Self::TreeEnsemble(_) => "tree_ensemble",
        }
    }
}

impl Classifier for FittedClassifier {
    fn n_features(&self) -> usize {
        match self {
            Self::Logistic(m) => m.coefficients.len(),
            Self::TreeEnsemble(m) => m.n_features,
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        match self {
            Self::Logistic(m) => m.validate(),
            Self::TreeEnsemble(m) => m.validate(),
        }
    }

    fn predict_proba(&self, scaled: &[f64]) -> Result<f64, ModelError> {
        let expected = self.n_features();
        if scaled.len() != expected {
            return Err(ModelError::DimensionMismatch {
                expected,
                actual: scaled.len(),
            });
        }
        let p = match self {
            Self::Logistic(m) => m.probability(scaled),
            Self::TreeEnsemble(m) => m.probability(scaled),
        };
        if !p.is_finite() {
            return Err(ModelError::NonFinite);
        }
        Ok(p.clamp(0.0, 1.0))
    }
}

/// Contents of `classifier.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    pub version: String,
    #[serde(flatten)]
    pub model: FittedClassifier,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_logistic_artifact() {
        let json = r#"{
            "version": "test-1",
            "kind": "logistic",
            "coefficients": [1.0, 0.0],
            "intercept": 0.0
        }"#;
        let artifact: ClassifierArtifact = serde_json::from_str(json).expect("parse");
        assert_eq!(artifact.version, "test-1");
        assert_eq!(artifact.model.kind(), "logistic");
        assert_eq!(artifact.model.n_features(), 2);
        let p = artifact.model.predict_proba(&[0.0, 5.0]).expect("predict");
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_parse_tree_artifact() {
        let json = r#"{
            "version": "test-2",
            "kind": "tree_ensemble",
            "n_features": 1,
            "base_score": 0.0,
            "trees": [{"nodes": [
                {"feature": 0, "threshold": 0.0, "left": 1, "right": 2},
                {"leaf": -1.0},
                {"leaf": 1.0}
            ]}]
        }"#;
        let artifact: ClassifierArtifact = serde_json::from_str(json).expect("parse");
        assert!(artifact.model.validate().is_ok());
        let lo = artifact.model.predict_proba(&[-1.0]).expect("predict");
        let hi = artifact.model.predict_proba(&[1.0]).expect("predict");
        assert!(lo < 0.5 && hi > 0.5);
    }

    #[test]
    fn test_dimension_mismatch() {
        let model = FittedClassifier::Logistic(LogisticModel {
            coefficients: vec![1.0, 1.0],
            intercept: 0.0,
            calibration: None,
        });
        assert_eq!(
            model.predict_proba(&[1.0]),
            Err(ModelError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_shipped_classifier_is_valid() {
        let content = std::fs::read_to_string("models/classifier.json").expect("read classifier");
        let artifact: ClassifierArtifact = serde_json::from_str(&content).expect("parse classifier");
        assert!(artifact.model.validate().is_ok());
        assert_eq!(artifact.model.n_features(), 14);
    }
}

//! Additive ensemble of regression trees (gradient boosting).
//!
//! Trees are stored as flat node arrays; node 0 is the root. A split sends
//! `x[feature] < threshold` left, and a NaN value follows `default_left`.

use serde::{Deserialize, Serialize};

use super::sigmoid;
use crate::ports::ModelError;

/// One tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default = "default_true")]
        default_left: bool,
    },
    Leaf {
        leaf: f64,
    },
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("empty tree".into());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= n_features {
                        return Err(format!("node {i} splits on feature {feature}"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {i} has a non-finite threshold"));
                    }
                    // Children must come after their parent, which also rules out cycles.
                    for child in [left, right] {
                        if *child <= i || *child >= self.nodes.len() {
                            return Err(format!("node {i} has child {child} out of bounds"));
                        }
                    }
                }
                TreeNode::Leaf { leaf } => {
                    if !leaf.is_finite() {
                        return Err(format!("node {i} has a non-finite leaf"));
                    }
                }
            }
        }
        Ok(())
    }

    /// Leaf value reached by `x`. Assumes a validated tree.
    fn predict(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { leaf } => return *leaf,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let v = x.get(*feature).copied().unwrap_or(f64::NAN);
                    let go_left = if v.is_nan() { *default_left } else { v < *threshold };
                    idx = if go_left { *left } else { *right };
                }
            }
        }
    }
}

/// Fitted boosted ensemble: `sigmoid(base_score + sum of leaves)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub n_features: usize,
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<RegressionTree>,
}

impl TreeEnsemble {
    /// # Errors
    /// Returns `ModelError::InvalidArtifact` for an empty ensemble or a tree
    /// with out-of-bounds indices.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::InvalidArtifact("tree ensemble has no trees".into()));
        }
        if !self.base_score.is_finite() {
            return Err(ModelError::InvalidArtifact("non-finite base_score".into()));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|e| ModelError::InvalidArtifact(format!("tree {t}: {e}")))?;
        }
        Ok(())
    }

    /// Raw margin before the sigmoid.
    #[must_use]
    pub fn margin(&self, scaled: &[f64]) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict(scaled)).sum::<f64>()
    }

    #[must_use]
    pub fn probability(&self, scaled: &[f64]) -> f64 {
        sigmoid(self.margin(scaled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn stump(feature: usize, threshold: f64, lo: f64, hi: f64) -> RegressionTree {
        RegressionTree {
            nodes: vec![
                TreeNode::Split {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                    default_left: false,
                },
                TreeNode::Leaf { leaf: lo },
                TreeNode::Leaf { leaf: hi },
            ],
        }
    }

    #[test]
    fn test_margin_sums_trees() {
        let ensemble = TreeEnsemble {
            n_features: 2,
            base_score: -0.5,
            trees: vec![stump(0, 0.0, -1.0, 1.0), stump(1, 0.5, 0.25, 0.75)],
        };
        assert!(ensemble.validate().is_ok());
        assert_relative_eq!(ensemble.margin(&[-1.0, 1.0]), -0.75);
        assert_relative_eq!(ensemble.margin(&[1.0, 0.0]), 0.75);
        // NaN follows default_left = false.
        assert_relative_eq!(ensemble.margin(&[f64::NAN, 0.0]), 0.75);
        assert_relative_eq!(ensemble.probability(&[0.0, 0.0]), sigmoid(0.75));
    }

    #[test]
    fn test_validation_rejects_bad_indices() {
        let mut tree = stump(0, 0.0, 0.0, 0.0);
        if let TreeNode::Split { right, .. } = &mut tree.nodes[0] {
            *right = 7;
        }
        let ensemble = TreeEnsemble {
            n_features: 1,
            base_score: 0.0,
            trees: vec![tree],
        };
        assert!(ensemble.validate().is_err());

        let ensemble = TreeEnsemble {
            n_features: 1,
            base_score: 0.0,
            trees: vec![stump(3, 0.0, 0.0, 0.0)],
        };
        assert!(ensemble.validate().is_err());
    }

    #[test]
    fn test_nodes_parse_from_json() {
        let json = r#"{"nodes": [
            {"feature": 0, "threshold": 0.5, "left": 1, "right": 2},
            {"leaf": -0.2},
            {"leaf": 0.4}
        ]}"#;
        let tree: RegressionTree = serde_json::from_str(json).expect("parse");
        assert_eq!(tree.nodes.len(), 3);
        assert!(matches!(
            tree.nodes[0],
            TreeNode::Split { default_left: true, .. }
        ));
        assert_relative_eq!(tree.predict(&[f64::NAN]), -0.2);
    }
}

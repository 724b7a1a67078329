//! Classifier port: Trait for a fitted binary classifier.
//!
//! The application only ever needs P(recurrence) for a scaled feature row;
//! how the model computes it is an adapter concern.

/// Errors raised while scoring.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Model expects {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Model produced a non-finite probability")]
    NonFinite,

    #[error("Invalid model artifact: {0}")]
    InvalidArtifact(String),
}

/// A fitted classifier over scaled features.
///
/// Implementations are immutable once loaded and shared read-only.
pub trait Classifier: Send + Sync {
    /// Number of features the model was fitted on.
    fn n_features(&self) -> usize;

    /// Check the fitted parameters before first use.
    ///
    /// # Errors
    /// Returns `ModelError::InvalidArtifact` if the parameters cannot be scored.
    fn validate(&self) -> Result<(), ModelError> {
        Ok(())
    }

    /// Calibrated probability of the positive class.
    ///
    /// # Errors
    /// Returns `ModelError::DimensionMismatch` for a row of the wrong length
    /// and `ModelError::NonFinite` if the score is not a number.
    fn predict_proba(&self, scaled: &[f64]) -> Result<f64, ModelError>;

    /// Score several rows.
    ///
    /// # Errors
    /// Fails on the first row that fails.
    fn predict_proba_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        rows.iter().map(|r| self.predict_proba(r)).collect()
    }
}

//! Artifact store port: Trait for loading the fitted model artifacts.
//!
//! Artifacts are loaded once at start and never written back.

use crate::domain::{BackgroundCohort, FeatureSchema, ImputationTable, SchemaError, StandardScaler};

use super::Classifier;

/// The fitted model: feature order, scaler and classifier.
#[derive(Debug, Clone)]
pub struct ModelArtifacts<C> {
    /// Identifies the fitted model (reported with every prediction)
    pub version: String,
    pub schema: FeatureSchema,
    pub scaler: StandardScaler,
    pub classifier: C,
}

impl<C: Classifier> ModelArtifacts<C> {
    /// Check that scaler and classifier agree with the feature list.
    ///
    /// # Errors
    /// Returns `SchemaError` on any dimension mismatch.
    pub fn check_consistency(&self) -> Result<(), SchemaError> {
        self.scaler.validate(&self.schema)?;
        if self.classifier.n_features() != self.schema.len() {
            return Err(SchemaError::DimensionMismatch {
                what: "classifier",
                expected: self.schema.len(),
                actual: self.classifier.n_features(),
            });
        }
        Ok(())
    }
}

/// Trait for read-only artifact storage.
pub trait ArtifactStore: Send + Sync {
    /// Classifier type produced by this store.
    type Classifier: Classifier;

    /// Error type for load operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load selected features, scaler and classifier.
    ///
    /// # Errors
    /// Returns error if any artifact is missing, corrupt or inconsistent.
    fn load_model(&self) -> Result<ModelArtifacts<Self::Classifier>, Self::Error>;

    /// Load the versioned imputation table.
    ///
    /// # Errors
    /// Returns error if the table exists but cannot be read.
    fn load_imputation_table(&self) -> Result<ImputationTable, Self::Error>;

    /// Load the background cohort aligned with `schema` and scaled by `scaler`.
    ///
    /// # Errors
    /// Returns error if the cohort is missing or malformed.
    fn load_cohort(
        &self,
        schema: &FeatureSchema,
        scaler: &StandardScaler,
    ) -> Result<BackgroundCohort, Self::Error>;
}

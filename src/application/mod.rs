//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! scoring, explanation and the interactive session.

mod attribution;
mod dependence;
mod inference;
mod session;
mod similarity;

pub use attribution::{
    select_salient, AttributionEngine, DEFAULT_BACKGROUND_SIZE, DEFAULT_COALITION_SAMPLES,
    DEFAULT_SEED, MAX_REPORTED_FEATURES, MIN_RELATIVE_CONTRIBUTION,
};
pub use dependence::{PartialDependenceEngine, CONTINUOUS_GRID_POINTS};
pub use inference::InferenceService;
pub use session::Session;
pub use similarity::{SimilarityRetriever, DEFAULT_SIMILAR_CASES, NEAR_DUPLICATE_DISTANCE};

use crate::domain::{Field, MappingError};
use crate::ports::ModelError;

/// Failure of an explanation section (attribution, similarity, partial dependence).
///
/// These never abort a prediction; the section is reported as unavailable.
#[derive(Debug, thiserror::Error)]
pub enum ExplainError {
    #[error("Background cohort is empty")]
    EmptyCohort,

    #[error("Background cohort unavailable: {0}")]
    CohortUnavailable(String),

    #[error("{0} is not a model feature")]
    UnknownFeature(Field),

    #[error("Expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Coalition sampling failed: {0}")]
    Sampling(String),

    #[error("Attribution regression is singular")]
    SingularSystem,
}

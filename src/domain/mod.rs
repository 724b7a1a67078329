//! Domain layer: Core clinical types and logic.
//!
//! Pure types with no I/O. Everything the model sees passes through here:
//! label codes, imputation, feature assembly and the result bundle.

mod codec;
mod cohort;
mod features;
mod field;
mod imputation;
mod patient;
mod prediction;

pub use codec::{FeatureCodec, MappingError};
pub use cohort::{BackgroundCohort, CohortError};
pub use features::{FeatureSchema, FeatureVector, ScaledFeatureVector, SchemaError, StandardScaler};
pub use field::{Field, FieldKind, FIELD_COUNT};
pub use imputation::{ImputationEngine, ImputationError, ImputationTable, ReceptorMedians, ResolvedFields};
pub use patient::{EncodedInput, FieldValue, PatientInput};
pub use prediction::{
    confidence_score, Attribution, ConfidenceBand, Enrichment, FeatureContribution, PartialDependence,
    PdPoint, PredictionResult, RiskTier, SimilarCase, HIGH_RISK_THRESHOLD, IMPUTATION_PENALTY,
    LOW_RISK_THRESHOLD,
};

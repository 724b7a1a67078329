//! Prediction result types.
//!
//! Represents the output of one pipeline run: probability, risk tier,
//! confidence and the optional explanation sections.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::field::Field;

/// Probability below which a case is Low risk.
pub const LOW_RISK_THRESHOLD: f64 = 0.30;
/// Probability below which a case is Moderate risk.
pub const HIGH_RISK_THRESHOLD: f64 = 0.60;
/// Confidence lost per imputed field.
pub const IMPUTATION_PENALTY: f64 = 0.05;

/// Risk tier for recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskTier {
    /// Low probability of recurrence
    Low,
    /// Moderate probability, closer follow-up
    Moderate,
    /// High probability of recurrence
    High,
}

impl RiskTier {
    /// Band a probability: p < 0.30 Low, p < 0.60 Moderate, else High.
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        if probability < LOW_RISK_THRESHOLD {
            Self::Low
        } else if probability < HIGH_RISK_THRESHOLD {
            Self::Moderate
        } else {
            Self::High
        }
    }

    /// Get a human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Low => "Low risk - Standard surveillance",
            Self::Moderate => "Moderate risk - Closer follow-up recommended",
            Self::High => "High risk - Consider adjuvant treatment review",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Moderate => write!(f, "MODERATE"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// Qualitative band of the confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConfidenceBand {
    Low,
    Moderate,
    High,
}

impl ConfidenceBand {
    #[must_use]
    pub fn from_score(confidence: f64) -> Self {
        if confidence >= 0.70 {
            Self::High
        } else if confidence >= 0.40 {
            Self::Moderate
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Moderate => write!(f, "MODERATE"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// Heuristic confidence in [0, 1].
///
/// Distance from the decision boundary, minus a fixed penalty per imputed
/// field, floored at zero.
#[must_use]
pub fn confidence_score(probability: f64, n_imputed: usize) -> f64 {
    let p = probability.clamp(0.0, 1.0);
    let decision_distance = (p - 0.5).abs() * 2.0;
    let penalty = n_imputed as f64 * IMPUTATION_PENALTY;
    (decision_distance - penalty).max(0.0)
}

/// Signed contribution of one feature to a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: Field,
    /// Raw (unscaled) value the case had for this feature
    pub value: f64,
    pub contribution: f64,
}

/// Local explanation of one prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    /// Mean predicted probability over the background sample
    pub base_value: f64,
    /// Probability being explained
    pub prediction: f64,
    /// Salient contributions, ascending by magnitude
    pub contributions: Vec<FeatureContribution>,
}

/// A comparable historical case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarCase {
    /// Row index in the background cohort
    pub row: usize,
    /// Euclidean distance in scaled space
    pub distance: f64,
    pub recurrence: bool,
    pub features: BTreeMap<Field, f64>,
    /// Labels for the categorical features
    pub labels: BTreeMap<Field, String>,
}

/// One grid point of a partial-dependence sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdPoint {
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub probability: f64,
}

/// Probability as one feature sweeps its domain, others at the cohort mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialDependence {
    pub feature: Field,
    pub categorical: bool,
    pub points: Vec<PdPoint>,
}

/// An optional result section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Enrichment<T> {
    Available(T),
    Unavailable { reason: String },
}

impl<T> Enrichment<T> {
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    #[must_use]
    pub fn as_available(&self) -> Option<&T> {
        match self {
            Self::Available(v) => Some(v),
            Self::Unavailable { .. } => None,
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for Enrichment<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Self::Available(v),
            Err(e) => Self::unavailable(e.to_string()),
        }
    }
}

/// Complete result of one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Unique identifier
    pub id: String,

    /// Calibrated probability of recurrence (0.0 to 1.0)
    pub probability: f64,

    pub risk_tier: RiskTier,

    /// Confidence score (0.0 to 1.0)
    pub confidence: f64,

    pub confidence_band: ConfidenceBand,

    /// Number of fields filled by imputation (0 to 14)
    pub n_imputed: usize,

    pub imputed_fields: Vec<Field>,

    pub attribution: Enrichment<Attribution>,

    pub similar_cases: Enrichment<Vec<SimilarCase>>,

    pub model_version: String,

    pub imputation_version: String,

    /// Timestamp of prediction
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl PredictionResult {
    /// Assemble a result; tier and confidence derive from the probability.
    #[must_use]
    pub fn new(
        probability: f64,
        imputed_fields: Vec<Field>,
        attribution: Enrichment<Attribution>,
        similar_cases: Enrichment<Vec<SimilarCase>>,
        model_version: impl Into<String>,
        imputation_version: impl Into<String>,
    ) -> Self {
        let n_imputed = imputed_fields.len();
        let confidence = confidence_score(probability, n_imputed);
        Self {
            id: uuid_v4(),
            probability,
            risk_tier: RiskTier::from_probability(probability),
            confidence,
            confidence_band: ConfidenceBand::from_score(confidence),
            n_imputed,
            imputed_fields,
            attribution,
            similar_cases,
            model_version: model_version.into(),
            imputation_version: imputation_version.into(),
            created_at: chrono::Utc::now(),
        }
    }
}

/// Generate a random UUID v4 from a ChaCha20 CSPRNG seeded by OS entropy.
fn uuid_v4() -> String {
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    let mut rng = ChaCha20Rng::from_entropy();
    let bytes: [u8; 16] = rng.gen();

    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        (bytes[6] & 0x0f) | 0x40, bytes[7],
        (bytes[8] & 0x3f) | 0x80, bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]
    )
}

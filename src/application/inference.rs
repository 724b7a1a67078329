//! Inference service: Orchestrates the recurrence-risk pipeline.
//!
//! This service coordinates:
//! - Label -> code resolution
//! - Imputation of unset fields
//! - Feature assembly, scaling and scoring
//! - Confidence and risk banding
//! - Attribution and similar-case retrieval (degrading to "unavailable")
//! - On-demand partial dependence

use std::sync::Arc;

use super::{AttributionEngine, ExplainError, PartialDependenceEngine, SimilarityRetriever};
use crate::config::Settings;
use crate::domain::{
    Attribution, BackgroundCohort, Enrichment, FeatureCodec, Field, ImputationEngine,
    PartialDependence, PatientInput, PredictionResult, SimilarCase,
};
use crate::ports::{ArtifactStore, Classifier, ModelArtifacts};
use crate::NestError;

/// Service for scoring patients against the loaded model.
///
/// Artifacts are loaded once and shared read-only; the service is `Send + Sync`
/// and holds no per-request state.
pub struct InferenceService<C>
where
    C: Classifier,
{
    codec: Arc<FeatureCodec>,
    imputation: ImputationEngine,
    model: Arc<ModelArtifacts<C>>,
    /// Background cohort, or why it could not be loaded.
    cohort: Result<Arc<BackgroundCohort>, String>,
    attribution: AttributionEngine,
    similarity: SimilarityRetriever,
    dependence: PartialDependenceEngine,
}

impl<C> InferenceService<C>
where
    C: Classifier,
{
    /// Load every artifact from `store`.
    ///
    /// Model and imputation-table problems are fatal. A missing or malformed
    /// cohort is not: the service starts and reports the enrichment sections as
    /// unavailable.
    ///
    /// # Errors
    /// Returns error if the model or imputation table cannot be loaded.
    pub fn load<S>(store: &S, settings: &Settings) -> Result<Self, NestError>
    where
        S: ArtifactStore<Classifier = C>,
        S::Error: Into<NestError>,
    {
        tracing::info!("Initializing inference service...");

        let codec = FeatureCodec::reference();
        let model = store.load_model().map_err(Into::<NestError>::into)?;
        let table = store
            .load_imputation_table()
            .map_err(Into::<NestError>::into)?;
        let imputation = ImputationEngine::new(table, &codec)?;

        let cohort = match store.load_cohort(&model.schema, &model.scaler) {
            Ok(c) => Ok(Arc::new(c)),
            Err(e) => {
                tracing::warn!("Background cohort unavailable: {e}");
                Err(e.to_string())
            }
        };

        let attribution = AttributionEngine {
            background_size: settings.attribution_background,
            coalition_samples: settings.attribution_samples,
            seed: settings.attribution_seed,
        };
        let similarity = SimilarityRetriever {
            k: settings.similar_cases,
            ..SimilarityRetriever::default()
        };

        Self::new(codec, imputation, model, cohort, attribution, similarity)
    }

    /// Assemble a service from already loaded parts.
    ///
    /// # Errors
    /// Returns error if the classifier parameters are invalid or the model
    /// artifacts are inconsistent.
    pub fn new(
        codec: FeatureCodec,
        imputation: ImputationEngine,
        model: ModelArtifacts<C>,
        cohort: Result<Arc<BackgroundCohort>, String>,
        attribution: AttributionEngine,
        similarity: SimilarityRetriever,
    ) -> Result<Self, NestError> {
        model.classifier.validate()?;
        model.check_consistency()?;
        if let Ok(c) = &cohort {
            if c.schema() != &model.schema {
                return Err(NestError::Config(
                    "background cohort columns do not match the selected features".into(),
                ));
            }
        }

        Ok(Self {
            codec: Arc::new(codec),
            imputation,
            model: Arc::new(model),
            cohort,
            attribution,
            similarity,
            dependence: PartialDependenceEngine::default(),
        })
    }

    #[must_use]
    pub fn codec(&self) -> &FeatureCodec {
        &self.codec
    }

    #[must_use]
    pub fn model_version(&self) -> &str {
        &self.model.version
    }

    /// Whether attribution, similarity and partial dependence can run.
    #[must_use]
    pub fn has_cohort(&self) -> bool {
        self.cohort.is_ok()
    }

    fn cohort(&self) -> Result<&BackgroundCohort, ExplainError> {
        self.cohort
            .as_deref()
            .map_err(|reason| ExplainError::CohortUnavailable(reason.clone()))
    }

    /// Run the full pipeline for one patient.
    ///
    /// Performs:
    /// 1. Resolve labels to codes (invalid values fall through to imputation)
    /// 2. Impute unset fields
    /// 3. Assemble and scale the feature vector
    /// 4. Score
    /// 5. Attribute and retrieve similar cases
    ///
    /// # Errors
    /// Returns error only for artifact inconsistencies or a model failure.
    /// Enrichment failures are reported inside the result.
    pub fn submit(&self, input: &PatientInput) -> Result<PredictionResult, NestError> {
        tracing::info!("Starting inference pipeline...");

        // Step 1: Encode
        tracing::debug!("Step 1: Resolving {} provided fields...", input.count_set());
        let encoded = input.encode(&self.codec);
        if !encoded.rejected.is_empty() {
            tracing::warn!("{} fields had invalid values", encoded.rejected.len());
        }

        // Step 2: Impute
        tracing::debug!("Step 2: Imputing unset fields...");
        let resolved = self.imputation.impute(&encoded);
        tracing::debug!("Imputed {} of {} fields", resolved.n_imputed(), Field::ALL.len());

        // Step 3: Assemble + scale
        tracing::debug!("Step 3: Assembling feature vector...");
        let raw = self.model.schema.assemble(&resolved)?;
        let scaled = self.model.scaler.transform(&raw);

        // Step 4: Score
        tracing::debug!("Step 4: Scoring...");
        let probability = self.model.classifier.predict_proba(scaled.as_slice())?;

        // Step 5: Enrichment
        tracing::debug!("Step 5: Attribution and similar cases...");
        let attribution: Enrichment<Attribution> = self
            .cohort()
            .and_then(|cohort| {
                self.attribution.attribute(
                    &self.model.classifier,
                    &self.model.schema,
                    &raw,
                    &scaled,
                    cohort,
                )
            })
            .into();
        let similar_cases: Enrichment<Vec<SimilarCase>> = self
            .cohort()
            .and_then(|cohort| self.similarity.nearest(&scaled, cohort, &self.codec))
            .into();
        if let Enrichment::Unavailable { reason } = &attribution {
            tracing::warn!("Attribution unavailable: {reason}");
        }
        if let Enrichment::Unavailable { reason } = &similar_cases {
            tracing::warn!("Similar cases unavailable: {reason}");
        }

        let result = PredictionResult::new(
            probability,
            resolved.imputed_fields().to_vec(),
            attribution,
            similar_cases,
            self.model.version.clone(),
            self.imputation.table().version.clone(),
        );

        tracing::info!(
            "Inference complete: probability={:.4}, risk={}, confidence={:.2} ({}), n_imputed={}",
            result.probability,
            result.risk_tier,
            result.confidence,
            result.confidence_band,
            result.n_imputed
        );

        Ok(result)
    }

    /// Partial dependence of the model on `field`.
    ///
    /// # Errors
    /// Returns error if the field is not a model feature or the cohort is
    /// unavailable or empty.
    pub fn sweep(&self, field: Field) -> Result<PartialDependence, ExplainError> {
        let cohort = self.cohort()?;
        self.dependence.sweep(
            &self.model.classifier,
            &self.model.schema,
            &self.model.scaler,
            cohort,
            &self.codec,
            field,
        )
    }
}

//! Interactive session state.
//!
//! Holds the latest prediction until the next submission replaces it, plus
//! the most recently requested partial-dependence sweep.

use std::sync::Arc;

use super::{ExplainError, InferenceService};
use crate::domain::{Field, PartialDependence, PatientInput, PredictionResult};
use crate::ports::Classifier;
use crate::NestError;

pub struct Session<C>
where
    C: Classifier,
{
    service: Arc<InferenceService<C>>,
    latest: Option<PredictionResult>,
    sweep: Option<PartialDependence>,
}

impl<C> Session<C>
where
    C: Classifier,
{
    #[must_use]
    pub fn new(service: Arc<InferenceService<C>>) -> Self {
        Self {
            service,
            latest: None,
            sweep: None,
        }
    }

    /// Score `input` and make the result current.
    ///
    /// A successful submission replaces the previous result and drops any
    /// cached sweep. A failed one leaves the session untouched.
    ///
    /// # Errors
    /// Propagates pipeline errors from [`InferenceService::submit`].
    pub fn submit(&mut self, input: &PatientInput) -> Result<&PredictionResult, NestError> {
        let result = self.service.submit(input)?;
        self.sweep = None;
        Ok(self.latest.insert(result))
    }

    #[must_use]
    pub fn latest(&self) -> Option<&PredictionResult> {
        self.latest.as_ref()
    }

    /// Partial dependence for `field`, computed on first request.
    ///
    /// Only the most recent feature is cached.
    ///
    /// # Errors
    /// Propagates errors from [`InferenceService::sweep`]; failures are not cached.
    pub fn sweep(&mut self, field: Field) -> Result<&PartialDependence, ExplainError> {
        let cached = self.sweep.as_ref().is_some_and(|pd| pd.feature == field);
        if !cached {
            self.sweep = None;
            self.sweep = Some(self.service.sweep(field)?);
        }
        self.sweep.as_ref().ok_or(ExplainError::UnknownFeature(field))
    }

    #[must_use]
    pub fn cached_sweep(&self) -> Option<&PartialDependence> {
        self.sweep.as_ref()
    }
}

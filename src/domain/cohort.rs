//! Historical background cohort.
//!
//! Kept both raw (partial dependence, case display) and scaled through the
//! fitted scaler (attribution, similarity). Read-only once built.

use super::features::{FeatureSchema, StandardScaler};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CohortError {
    #[error("Cohort row {row} has {actual} values, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Cohort has {rows} rows but {outcomes} outcomes")]
    OutcomeCount { rows: usize, outcomes: usize },

    #[error("Cohort row {0} has a non-finite value")]
    NonFinite(usize),
}

/// Background cohort aligned with a `FeatureSchema`.
#[derive(Debug, Clone)]
pub struct BackgroundCohort {
    schema: FeatureSchema,
    raw: Vec<Vec<f64>>,
    scaled: Vec<Vec<f64>>,
    outcomes: Vec<bool>,
}

impl BackgroundCohort {
    /// Build the cohort, scaling every row once.
    ///
    /// # Errors
    /// Returns error on ragged rows, mismatched outcomes or non-finite values.
    pub fn new(
        schema: FeatureSchema,
        raw: Vec<Vec<f64>>,
        outcomes: Vec<bool>,
        scaler: &StandardScaler,
    ) -> Result<Self, CohortError> {
        if raw.len() != outcomes.len() {
            return Err(CohortError::OutcomeCount {
                rows: raw.len(),
                outcomes: outcomes.len(),
            });
        }
        for (i, row) in raw.iter().enumerate() {
            if row.len() != schema.len() {
                return Err(CohortError::RowWidth {
                    row: i,
                    expected: schema.len(),
                    actual: row.len(),
                });
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(CohortError::NonFinite(i));
            }
        }
        let scaled = raw.iter().map(|r| scaler.transform_row(r)).collect();

        Ok(Self {
            schema,
            raw,
            scaled,
            outcomes,
        })
    }

    #[must_use]
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    #[must_use]
    pub fn raw_rows(&self) -> &[Vec<f64>] {
        &self.raw
    }

    #[must_use]
    pub fn scaled_rows(&self) -> &[Vec<f64>] {
        &self.scaled
    }

    #[must_use]
    pub fn outcome(&self, row: usize) -> Option<bool> {
        self.outcomes.get(row).copied()
    }

    /// Observed (min, max) of a raw column. `None` for an empty cohort.
    #[must_use]
    pub fn column_range(&self, column: usize) -> Option<(f64, f64)> {
        let mut values = self.raw.iter().filter_map(|r| r.get(column).copied());
        let first = values.next()?;
        Some(values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    /// Column means of the raw rows. `None` for an empty cohort.
    #[must_use]
    pub fn raw_means(&self) -> Option<Vec<f64>> {
        if self.raw.is_empty() {
            return None;
        }
        let n = self.raw.len() as f64;
        let mut sums = vec![0.0; self.schema.len()];
        for row in &self.raw {
            for (s, v) in sums.iter_mut().zip(row) {
                *s += v;
            }
        }
        Some(sums.into_iter().map(|s| s / n).collect())
    }
}

//! Nearest historical cases in scaled feature space.

use std::collections::BTreeMap;

use super::ExplainError;
use crate::domain::{BackgroundCohort, FeatureCodec, ScaledFeatureVector, SimilarCase};

pub const DEFAULT_SIMILAR_CASES: usize = 3;

/// Rows closer than this are treated as the query itself and skipped.
pub const NEAR_DUPLICATE_DISTANCE: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityRetriever {
    pub k: usize,
    pub min_distance: f64,
}

impl Default for SimilarityRetriever {
    fn default() -> Self {
        Self {
            k: DEFAULT_SIMILAR_CASES,
            min_distance: NEAR_DUPLICATE_DISTANCE,
        }
    }
}

impl SimilarityRetriever {
    /// Up to `k` cohort cases nearest to `query`, closest first.
    ///
    /// Equal distances keep cohort order. Returns fewer than `k` only when the
    /// cohort has fewer eligible rows.
    ///
    /// # Errors
    /// Returns error if the cohort is empty or the query has the wrong width.
    pub fn nearest(
        &self,
        query: &ScaledFeatureVector,
        cohort: &BackgroundCohort,
        codec: &FeatureCodec,
    ) -> Result<Vec<SimilarCase>, ExplainError> {
        if cohort.is_empty() {
            return Err(ExplainError::EmptyCohort);
        }
        let q = query.as_slice();
        if q.len() != cohort.schema().len() {
            return Err(ExplainError::DimensionMismatch {
                expected: cohort.schema().len(),
                actual: q.len(),
            });
        }

        let mut ranked: Vec<(usize, f64)> = cohort
            .scaled_rows()
            .iter()
            .map(|row| euclidean(q, row))
            .enumerate()
            .filter(|(_, d)| *d >= self.min_distance)
            .collect();
        // Stable sort: ties stay in cohort order.
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
        ranked.truncate(self.k);

        let fields = cohort.schema().fields();
        let cases = ranked
            .into_iter()
            .map(|(row, distance)| {
                let raw = &cohort.raw_rows()[row];
                let features: BTreeMap<_, _> =
                    fields.iter().copied().zip(raw.iter().copied()).collect();
                let labels = features
                    .iter()
                    .filter_map(|(f, v)| codec.decode(*f, *v).ok().map(|l| (*f, l.to_string())))
                    .collect();
                SimilarCase {
                    row,
                    distance,
                    recurrence: cohort.outcome(row).unwrap_or(false),
                    features,
                    labels,
                }
            })
            .collect();
        Ok(cases)
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

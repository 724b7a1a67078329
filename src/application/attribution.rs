//! Kernel SHAP attribution for a single scored case.
//!
//! Coalitions are sampled with the Shapley kernel (size drawn with weight
//! `(M-1) / (s (M-s))`, members drawn uniformly). Each coalition is valued as
//! the mean prediction over the background sample with the case's values
//! substituted for the coalition members. The per-feature values then come from
//! a least-squares fit constrained so that they sum to `f(x) - E[f]`.
//!
//! All randomness comes from a seeded ChaCha RNG: a given case and cohort always
//! produce the same attribution.

use nalgebra::{DMatrix, DVector};
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::ExplainError;
use crate::domain::{
    Attribution, BackgroundCohort, FeatureContribution, FeatureSchema, FeatureVector,
    ScaledFeatureVector,
};
use crate::ports::Classifier;

pub const DEFAULT_BACKGROUND_SIZE: usize = 20;
pub const DEFAULT_COALITION_SAMPLES: usize = 50;
pub const DEFAULT_SEED: u64 = 42;

/// Contributions at or below this share of the largest are dropped.
pub const MIN_RELATIVE_CONTRIBUTION: f64 = 0.01;
/// At most this many features are reported.
pub const MAX_REPORTED_FEATURES: usize = 10;

const RIDGE: f64 = 1e-8;

/// Sampling parameters for kernel SHAP.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributionEngine {
    pub background_size: usize,
    pub coalition_samples: usize,
    pub seed: u64,
}

impl Default for AttributionEngine {
    fn default() -> Self {
        Self {
            background_size: DEFAULT_BACKGROUND_SIZE,
            coalition_samples: DEFAULT_COALITION_SAMPLES,
            seed: DEFAULT_SEED,
        }
    }
}

impl AttributionEngine {
    /// Explain the prediction for one case.
    ///
    /// `raw` is only used to report each feature's value; the model sees
    /// `scaled`. Contributions are filtered with [`select_salient`].
    ///
    /// # Errors
    /// Returns error for an empty cohort, mismatched dimensions, a model
    /// failure or a singular regression.
    pub fn attribute<C: Classifier + ?Sized>(
        &self,
        classifier: &C,
        schema: &FeatureSchema,
        raw: &FeatureVector,
        scaled: &ScaledFeatureVector,
        cohort: &BackgroundCohort,
    ) -> Result<Attribution, ExplainError> {
        let m = schema.len();
        let x = scaled.as_slice();
        if x.len() != m || raw.as_slice().len() != m {
            return Err(ExplainError::DimensionMismatch {
                expected: m,
                actual: x.len(),
            });
        }
        if cohort.is_empty() {
            return Err(ExplainError::EmptyCohort);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let background = self.sample_background(cohort, &mut rng);

        let prediction = classifier.predict_proba(x)?;
        let base_value = mean(&classifier.predict_proba_batch(&background)?);
        let delta = prediction - base_value;

        let phi = if m == 1 {
            vec![delta]
        } else {
            let coalitions = sample_coalitions(m, self.coalition_samples, &mut rng)?;
            let values = coalitions
                .iter()
                .map(|mask| coalition_value(classifier, x, mask, &background))
                .collect::<Result<Vec<_>, _>>()?;
            solve_constrained(&coalitions, &values, base_value, delta)?
        };

        tracing::debug!(
            "Attribution: base={:.4}, prediction={:.4}, background={}, coalitions={}",
            base_value,
            prediction,
            background.len(),
            self.coalition_samples
        );

        let contributions = schema
            .fields()
            .iter()
            .zip(raw.as_slice())
            .zip(phi)
            .map(|((feature, value), contribution)| FeatureContribution {
                feature: *feature,
                value: *value,
                contribution,
            })
            .collect();

        Ok(Attribution {
            base_value,
            prediction,
            contributions: select_salient(contributions),
        })
    }

    /// Up to `background_size` scaled cohort rows, drawn without replacement.
    fn sample_background(&self, cohort: &BackgroundCohort, rng: &mut ChaCha8Rng) -> Vec<Vec<f64>> {
        let rows = cohort.scaled_rows();
        let k = self.background_size.clamp(1, rows.len());
        let mut picked = rand::seq::index::sample(rng, rows.len(), k).into_vec();
        picked.sort_unstable();
        picked.into_iter().map(|i| rows[i].clone()).collect()
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Draw `n` coalitions over `m >= 2` features, excluding the empty and full sets.
fn sample_coalitions(
    m: usize,
    n: usize,
    rng: &mut ChaCha8Rng,
) -> Result<Vec<Vec<bool>>, ExplainError> {
    let sizes: Vec<usize> = (1..m).collect();
    let weights: Vec<f64> = sizes
        .iter()
        .map(|&s| (m - 1) as f64 / (s * (m - s)) as f64)
        .collect();
    let size_dist =
        WeightedIndex::new(&weights).map_err(|e| ExplainError::Sampling(e.to_string()))?;

    Ok((0..n.max(1))
        .map(|_| {
            let size = sizes[size_dist.sample(rng)];
            let mut mask = vec![false; m];
            for j in rand::seq::index::sample(rng, m, size).into_iter() {
                mask[j] = true;
            }
            mask
        })
        .collect())
}

/// Mean prediction over the background with coalition members taken from `x`.
fn coalition_value<C: Classifier + ?Sized>(
    classifier: &C,
    x: &[f64],
    mask: &[bool],
    background: &[Vec<f64>],
) -> Result<f64, ExplainError> {
    let rows: Vec<Vec<f64>> = background
        .iter()
        .map(|b| {
            mask.iter()
                .zip(x.iter().zip(b))
                .map(|(on, (xv, bv))| if *on { *xv } else { *bv })
                .collect()
        })
        .collect();
    Ok(mean(&classifier.predict_proba_batch(&rows)?))
}

/// Least squares `values - base ~ Z phi` subject to `sum(phi) = delta`.
///
/// The last coefficient is eliminated as `delta - sum(others)`, which turns the
/// problem into an unconstrained fit on `m - 1` unknowns.
fn solve_constrained(
    coalitions: &[Vec<bool>],
    values: &[f64],
    base: f64,
    delta: f64,
) -> Result<Vec<f64>, ExplainError> {
    let m = coalitions.first().map_or(0, Vec::len);
    let n = coalitions.len();
    let last = m - 1;

    let a = DMatrix::from_fn(n, last, |i, j| {
        f64::from(u8::from(coalitions[i][j])) - f64::from(u8::from(coalitions[i][last]))
    });
    let b = DVector::from_fn(n, |i, _| {
        values[i] - base - f64::from(u8::from(coalitions[i][last])) * delta
    });

    let at = a.transpose();
    let mut normal = &at * &a;
    for d in 0..last {
        normal[(d, d)] += RIDGE;
    }
    let rhs = &at * &b;

    let solution = normal.lu().solve(&rhs).ok_or(ExplainError::SingularSystem)?;
    let mut phi: Vec<f64> = solution.iter().copied().collect();
    let rest: f64 = phi.iter().sum();
    phi.push(delta - rest);

    if phi.iter().any(|v| !v.is_finite()) {
        return Err(ExplainError::SingularSystem);
    }
    Ok(phi)
}

/// Keep the salient contributions.
///
/// Drops every contribution with `|phi| <= 1%` of the largest magnitude, keeps
/// the ten largest and returns them ascending by magnitude.
#[must_use]
pub fn select_salient(contributions: Vec<FeatureContribution>) -> Vec<FeatureContribution> {
    let max = contributions
        .iter()
        .map(|c| c.contribution.abs())
        .fold(0.0, f64::max);
    if max <= 0.0 {
        return Vec::new();
    }

    let mut kept: Vec<_> = contributions
        .into_iter()
        .filter(|c| c.contribution.abs() > MIN_RELATIVE_CONTRIBUTION * max)
        .collect();
    kept.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));
    kept.truncate(MAX_REPORTED_FEATURES);
    kept.reverse();
    kept
}

//! Partial dependence: model response to one feature across its domain.
//!
//! Every other feature is held at its background-cohort mean, so the curve
//! describes the model, not the scored case.

use super::ExplainError;
use crate::domain::{
    BackgroundCohort, FeatureCodec, FeatureSchema, Field, PartialDependence, PdPoint,
    StandardScaler,
};
use crate::ports::Classifier;

/// Number of grid points for continuous features.
pub const CONTINUOUS_GRID_POINTS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialDependenceEngine {
    pub grid_points: usize,
}

impl Default for PartialDependenceEngine {
    fn default() -> Self {
        Self {
            grid_points: CONTINUOUS_GRID_POINTS,
        }
    }
}

impl PartialDependenceEngine {
    /// Sweep `field` and score each grid point.
    ///
    /// Categorical fields use their enumerated codes; continuous fields use
    /// evenly spaced points over the cohort's observed range.
    ///
    /// # Errors
    /// Returns error if the field is not a model feature, the cohort is empty,
    /// or the model fails on a grid point.
    pub fn sweep<C: Classifier + ?Sized>(
        &self,
        classifier: &C,
        schema: &FeatureSchema,
        scaler: &StandardScaler,
        cohort: &BackgroundCohort,
        codec: &FeatureCodec,
        field: Field,
    ) -> Result<PartialDependence, ExplainError> {
        let position = schema
            .position(field)
            .ok_or(ExplainError::UnknownFeature(field))?;
        let means = cohort.raw_means().ok_or(ExplainError::EmptyCohort)?;

        let categorical = field.is_categorical();
        let grid = if categorical {
            codec.codes(field)?
        } else {
            let (lo, hi) = cohort
                .column_range(position)
                .ok_or(ExplainError::EmptyCohort)?;
            linspace(lo, hi, self.grid_points)
        };

        let rows: Vec<Vec<f64>> = grid
            .iter()
            .map(|&value| {
                let mut row = means.clone();
                row[position] = value;
                scaler.transform_row(&row)
            })
            .collect();
        let probabilities = classifier.predict_proba_batch(&rows)?;

        let points = grid
            .into_iter()
            .zip(probabilities)
            .map(|(value, probability)| PdPoint {
                value,
                label: categorical
                    .then(|| codec.decode(field, value).ok())
                    .flatten()
                    .map(str::to_string),
                probability,
            })
            .collect::<Vec<_>>();

        tracing::debug!("Partial dependence for {field}: {} points", points.len());
        Ok(PartialDependence {
            feature: field,
            categorical,
            points,
        })
    }
}

/// `n` evenly spaced values from `lo` to `hi` inclusive.
fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![lo],
        _ => {
            let step = (hi - lo) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { hi } else { lo + step * i as f64 })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::model::{FittedClassifier, LogisticModel};

    fn fixture() -> (FittedClassifier, FeatureSchema, StandardScaler, BackgroundCohort) {
        let schema = FeatureSchema::new(&["age", "figo_stage", "lvsi"]).expect("schema");
        let scaler = StandardScaler {
            mean: vec![65.0, 3.0, 0.5],
            scale: vec![10.0, 2.0, 0.5],
        };
        let rows = vec![
            vec![48.0, 1.0, 0.0],
            vec![81.0, 11.0, 1.0],
            vec![66.0, 4.0, 0.0],
        ];
        let cohort =
            BackgroundCohort::new(schema.clone(), rows, vec![false, true, false], &scaler)
                .expect("cohort");
        let model = FittedClassifier::Logistic(LogisticModel {
            coefficients: vec![0.4, 0.6, 0.3],
            intercept: -1.0,
            calibration: None,
        });
        (model, schema, scaler, cohort)
    }

    #[test]
    fn test_continuous_sweep_spans_observed_range() {
        let (model, schema, scaler, cohort) = fixture();
        let pd = PartialDependenceEngine::default()
            .sweep(&model, &schema, &scaler, &cohort, &FeatureCodec::reference(), Field::Age)
            .expect("sweep");

        assert!(!pd.categorical);
        assert_eq!(pd.points.len(), 50);
        assert_eq!(pd.points[0].value, 48.0);
        assert_eq!(pd.points[49].value, 81.0);
        assert!(pd.points.iter().all(|p| p.label.is_none()));
        // Positive coefficient: probability rises with age.
        assert!(pd
            .points
            .windows(2)
            .all(|w| w[1].probability >= w[0].probability));
    }

    #[test]
    fn test_categorical_sweep_has_one_point_per_code() {
        let (model, schema, scaler, cohort) = fixture();
        let pd = PartialDependenceEngine::default()
            .sweep(
                &model,
                &schema,
                &scaler,
                &cohort,
                &FeatureCodec::reference(),
                Field::FigoStage,
            )
            .expect("sweep");

        assert!(pd.categorical);
        assert_eq!(pd.points.len(), 14);
        assert_eq!(pd.points[0].label.as_deref(), Some("IA1"));
        assert_eq!(pd.points[13].label.as_deref(), Some("IVB"));
    }

    #[test]
    fn test_sweep_errors() {
        let (model, schema, scaler, cohort) = fixture();
        let codec = FeatureCodec::reference();
        let engine = PartialDependenceEngine::default();
        assert!(matches!(
            engine.sweep(&model, &schema, &scaler, &cohort, &codec, Field::Bmi),
            Err(ExplainError::UnknownFeature(Field::Bmi))
        ));

        let empty = BackgroundCohort::new(schema.clone(), vec![], vec![], &scaler).expect("cohort");
        assert!(matches!(
            engine.sweep(&model, &schema, &scaler, &empty, &codec, Field::Age),
            Err(ExplainError::EmptyCohort)
        ));
    }

    #[test]
    fn test_linspace() {
        assert_eq!(linspace(0.0, 1.0, 5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(2.0, 2.0, 3), vec![2.0, 2.0, 2.0]);
        assert_eq!(linspace(1.0, 3.0, 1), vec![1.0]);
    }
}

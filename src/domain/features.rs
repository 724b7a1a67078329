//! Ordered model features and the fitted standard scaler.

use serde::{Deserialize, Serialize};

use super::field::Field;
use super::imputation::ResolvedFields;

/// Inconsistency between the persisted feature list, scaler and input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Selected feature list is empty")]
    Empty,

    #[error("Unknown feature name: {0}")]
    UnknownFeature(String),

    #[error("Duplicate feature name: {0}")]
    DuplicateFeature(String),

    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Selected feature {0} has no resolved value")]
    MissingValue(Field),

    #[error("Scaler has non-finite parameter at index {0}")]
    NonFiniteScaler(usize),
}

/// The ordered list of features the model was fitted on.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    fields: Vec<Field>,
}

impl FeatureSchema {
    /// Parse the persisted selected-feature names.
    ///
    /// # Errors
    /// Returns error on an empty list, an unknown name or a duplicate.
    pub fn new<S: AsRef<str>>(names: &[S]) -> Result<Self, SchemaError> {
        if names.is_empty() {
            return Err(SchemaError::Empty);
        }
        let mut fields = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let field = Field::from_key(name.trim())
                .ok_or_else(|| SchemaError::UnknownFeature(name.to_string()))?;
            if fields.contains(&field) {
                return Err(SchemaError::DuplicateFeature(name.to_string()));
            }
            fields.push(field);
        }
        Ok(Self { fields })
    }

    /// All fields in form order.
    #[must_use]
    pub fn full() -> Self {
        Self {
            fields: Field::ALL.to_vec(),
        }
    }

    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn position(&self, field: Field) -> Option<usize> {
        self.fields.iter().position(|f| *f == field)
    }

    /// Build the feature vector in schema order.
    ///
    /// # Errors
    /// `MissingValue` if a selected field was not resolved.
    pub fn assemble(&self, resolved: &ResolvedFields) -> Result<FeatureVector, SchemaError> {
        let values = self
            .fields
            .iter()
            .map(|f| resolved.get(*f).ok_or(SchemaError::MissingValue(*f)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FeatureVector(values))
    }
}

/// Raw numeric features in schema order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub Vec<f64>);

impl FeatureVector {
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Features after the fitted scaler.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledFeatureVector(pub Vec<f64>);

impl ScaledFeatureVector {
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Fitted standard scaler: `(x - mean) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Check the scaler against the schema.
    ///
    /// # Errors
    /// Returns error on length mismatch or non-finite parameters.
    pub fn validate(&self, schema: &FeatureSchema) -> Result<(), SchemaError> {
        for (what, len) in [("scaler mean", self.mean.len()), ("scaler scale", self.scale.len())] {
            if len != schema.len() {
                return Err(SchemaError::DimensionMismatch {
                    what,
                    expected: schema.len(),
                    actual: len,
                });
            }
        }
        if let Some(i) = self
            .mean
            .iter()
            .zip(&self.scale)
            .position(|(m, s)| !m.is_finite() || !s.is_finite())
        {
            return Err(SchemaError::NonFiniteScaler(i));
        }
        Ok(())
    }

    /// Scale one row.
    #[must_use]
    pub fn transform_row(&self, raw: &[f64]) -> Vec<f64> {
        raw.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| {
                let s = if *s == 0.0 { 1.0 } else { *s };
                (x - m) / s
            })
            .collect()
    }

    #[must_use]
    pub fn transform(&self, raw: &FeatureVector) -> ScaledFeatureVector {
        ScaledFeatureVector(self.transform_row(raw.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::codec::FeatureCodec;
    use crate::domain::imputation::{ImputationEngine, ImputationTable};
    use crate::domain::patient::PatientInput;

    #[test]
    fn test_schema_rejects_bad_lists() {
        let empty: [&str; 0] = [];
        assert_eq!(FeatureSchema::new(&empty), Err(SchemaError::Empty));
        assert_eq!(
            FeatureSchema::new(&["age", "tumor_size"]),
            Err(SchemaError::UnknownFeature("tumor_size".to_string()))
        );
        assert_eq!(
            FeatureSchema::new(&["age", "bmi", "age"]),
            Err(SchemaError::DuplicateFeature("age".to_string()))
        );
    }

    #[test]
    fn test_assemble_follows_schema_order() {
        let schema = FeatureSchema::new(&["lvsi", "age", "histologic_grade"]).expect("schema");
        let codec = FeatureCodec::reference();
        let engine = ImputationEngine::new(ImputationTable::reference(), &codec).expect("table");
        let input = PatientInput::new()
            .with(Field::Age, 60_i64)
            .with(Field::Lvsi, "Yes");
        let resolved = engine.impute(&input.encode(&codec));

        let vector = schema.assemble(&resolved).expect("assemble");
        assert_eq!(vector.as_slice(), &[1.0, 60.0, 1.0]);
    }

    #[test]
    fn test_scaler_transform_and_zero_scale() {
        let scaler = StandardScaler {
            mean: vec![60.0, 1.0],
            scale: vec![10.0, 0.0],
        };
        let scaled = scaler.transform(&FeatureVector(vec![75.0, 3.0]));
        assert_eq!(scaled.as_slice(), &[1.5, 2.0]);
    }

    #[test]
    fn test_scaler_validation() {
        let schema = FeatureSchema::new(&["age", "bmi"]).expect("schema");
        let short = StandardScaler {
            mean: vec![60.0],
            scale: vec![10.0, 5.0],
        };
        assert!(matches!(
            short.validate(&schema),
            Err(SchemaError::DimensionMismatch { expected: 2, actual: 1, .. })
        ));

        let nan = StandardScaler {
            mean: vec![60.0, f64::NAN],
            scale: vec![10.0, 5.0],
        };
        assert_eq!(nan.validate(&schema), Err(SchemaError::NonFiniteScaler(1)));
    }
}

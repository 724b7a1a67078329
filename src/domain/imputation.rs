//! Deterministic imputation of unset fields.
//!
//! The fallback values are a frozen snapshot of the training cohort's
//! statistics. They ship as a versioned table next to the model artifacts and
//! are never recomputed at serving time.
//!
//! Resolution order:
//! 1. Histologic grade (receptor medians depend on it).
//! 2. Estrogen / progesterone receptors, from medians stratified by grade.
//! 3. Every other field, from its fixed default.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::codec::FeatureCodec;
use super::field::{Field, FIELD_COUNT};
use super::patient::EncodedInput;

/// Problems with an imputation table.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ImputationError {
    #[error("Imputation table has no default for {0}")]
    MissingDefault(Field),

    #[error("Imputation default {value} for {field} is not a valid value")]
    InvalidDefault { field: Field, value: f64 },

    #[error("Imputation table has no receptor medians for grade {0}")]
    MissingReceptorMedians(i64),
}

/// Receptor medians for one histologic grade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReceptorMedians {
    pub estrogen: f64,
    pub progesterone: f64,
}

/// Versioned table of fallback values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputationTable {
    /// Identifies the statistics snapshot (reported with every prediction).
    pub version: String,

    /// Fallback per field. Receptor fields are absent: they come from
    /// `receptor_medians`.
    pub defaults: BTreeMap<Field, f64>,

    /// Receptor medians keyed by histologic grade code.
    pub receptor_medians: BTreeMap<i64, ReceptorMedians>,
}

impl ImputationTable {
    /// The statistics of the reference training cohort.
    #[must_use]
    pub fn reference() -> Self {
        let defaults = BTreeMap::from([
            (Field::Age, 65.0),
            (Field::Bmi, 29.4),
            (Field::RiskGroup, 1.0),
            (Field::PreopStage, 0.0),
            (Field::HistologicType, 2.0),
            (Field::HistologicGrade, 1.0),
            (Field::MyometrialInfiltration, 1.0),
            (Field::FigoStage, 1.0),
            (Field::DistantMetastasis, 0.0),
            (Field::PrimarySurgery, 1.0),
            (Field::SystemicTreatment, 0.0),
            (Field::Lvsi, 0.0),
        ]);
        let receptor_medians = BTreeMap::from([
            (
                1,
                ReceptorMedians {
                    estrogen: 90.0,
                    progesterone: 90.0,
                },
            ),
            (
                2,
                ReceptorMedians {
                    estrogen: 70.0,
                    progesterone: 25.0,
                },
            ),
        ]);

        Self {
            version: "reference".to_string(),
            defaults,
            receptor_medians,
        }
    }

    /// Check the table against the field enumerations.
    ///
    /// # Errors
    /// Returns the first missing or invalid entry.
    pub fn validate(&self, codec: &FeatureCodec) -> Result<(), ImputationError> {
        for field in Field::ALL {
            if is_receptor(field) {
                continue;
            }
            let value = *self
                .defaults
                .get(&field)
                .ok_or(ImputationError::MissingDefault(field))?;
            let valid = if field.is_categorical() {
                codec.is_valid_code(field, value)
            } else {
                field.clamp_value(value) == Some(value)
            };
            if !valid {
                return Err(ImputationError::InvalidDefault { field, value });
            }
        }

        let grades = codec
            .codes(Field::HistologicGrade)
            .map_err(|_| ImputationError::MissingDefault(Field::HistologicGrade))?;
        for grade in grades {
            let grade = grade as i64;
            let medians = self
                .receptor_medians
                .get(&grade)
                .ok_or(ImputationError::MissingReceptorMedians(grade))?;
            for (field, value) in [
                (Field::EstrogenReceptor, medians.estrogen),
                (Field::ProgesteroneReceptor, medians.progesterone),
            ] {
                if field.clamp_value(value) != Some(value) {
                    return Err(ImputationError::InvalidDefault { field, value });
                }
            }
        }
        Ok(())
    }
}

impl Default for ImputationTable {
    fn default() -> Self {
        Self::reference()
    }
}

fn is_receptor(field: Field) -> bool {
    matches!(field, Field::EstrogenReceptor | Field::ProgesteroneReceptor)
}

/// Fully resolved field values plus the record of what was imputed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFields {
    values: BTreeMap<Field, f64>,
    imputed: Vec<Field>,
}

impl ResolvedFields {
    #[must_use]
    pub fn get(&self, field: Field) -> Option<f64> {
        self.values.get(&field).copied()
    }

    /// Number of fields that had no usable input value.
    #[must_use]
    pub fn n_imputed(&self) -> usize {
        self.imputed.len()
    }

    /// Imputed fields in form order.
    #[must_use]
    pub fn imputed_fields(&self) -> &[Field] {
        &self.imputed
    }

    #[must_use]
    pub fn was_imputed(&self, field: Field) -> bool {
        self.imputed.contains(&field)
    }
}

/// Applies an `ImputationTable` to encoded input.
#[derive(Debug, Clone)]
pub struct ImputationEngine {
    table: ImputationTable,
}

impl ImputationEngine {
    /// Create an engine from a validated table.
    ///
    /// # Errors
    /// Returns error if the table does not cover every field and grade.
    pub fn new(table: ImputationTable, codec: &FeatureCodec) -> Result<Self, ImputationError> {
        table.validate(codec)?;
        Ok(Self { table })
    }

    #[must_use]
    pub fn table(&self) -> &ImputationTable {
        &self.table
    }

    /// Fill every unset field.
    ///
    /// Pure function of the input: the same input always resolves identically.
    #[must_use]
    pub fn impute(&self, input: &EncodedInput) -> ResolvedFields {
        let mut values = BTreeMap::new();
        let mut imputed = Vec::new();

        let default_of = |field: Field| self.table.defaults.get(&field).copied().unwrap_or(0.0);

        // Grade first: the receptor medians are stratified by it.
        let grade = match input.get(Field::HistologicGrade) {
            Some(g) => g,
            None => {
                imputed.push(Field::HistologicGrade);
                default_of(Field::HistologicGrade)
            }
        };
        values.insert(Field::HistologicGrade, grade);

        let medians = self
            .table
            .receptor_medians
            .get(&(grade as i64))
            .copied()
            .unwrap_or(ReceptorMedians {
                estrogen: 0.0,
                progesterone: 0.0,
            });

        for field in Field::ALL {
            if field == Field::HistologicGrade {
                continue;
            }
            let value = match input.get(field) {
                Some(v) => v,
                None => {
                    imputed.push(field);
                    match field {
                        Field::EstrogenReceptor => medians.estrogen,
                        Field::ProgesteroneReceptor => medians.progesterone,
                        _ => default_of(field),
                    }
                }
            };
            values.insert(field, value);
        }

        // Report in form order regardless of resolution order.
        imputed.sort();
        debug_assert!(values.len() == FIELD_COUNT);

        ResolvedFields { values, imputed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::patient::PatientInput;

    fn engine() -> ImputationEngine {
        ImputationEngine::new(ImputationTable::reference(), &FeatureCodec::reference())
            .expect("Reference table should validate")
    }

    fn resolve(input: &PatientInput) -> ResolvedFields {
        engine().impute(&input.encode(&FeatureCodec::reference()))
    }

    fn complete_input() -> PatientInput {
        PatientInput::new()
            .with(Field::Age, 58_i64)
            .with(Field::Bmi, 27.2)
            .with(Field::RiskGroup, "High")
            .with(Field::PreopStage, "Early")
            .with(Field::HistologicType, "Endometrioid")
            .with(Field::HistologicGrade, "High(G3)")
            .with(Field::MyometrialInfiltration, ">=50%")
            .with(Field::FigoStage, "IIIC1")
            .with(Field::DistantMetastasis, "No")
            .with(Field::PrimarySurgery, "Yes")
            .with(Field::SystemicTreatment, "Full dose")
            .with(Field::Lvsi, "Yes")
            .with(Field::EstrogenReceptor, 40.0)
            .with(Field::ProgesteroneReceptor, 10.0)
    }

    #[test]
    fn test_complete_input_imputes_nothing() {
        let resolved = resolve(&complete_input());
        assert_eq!(resolved.n_imputed(), 0);
        assert_eq!(resolved.get(Field::HistologicGrade), Some(2.0));
        assert_eq!(resolved.get(Field::EstrogenReceptor), Some(40.0));
    }

    #[test]
    fn test_empty_input_uses_modes_and_medians() {
        let resolved = resolve(&PatientInput::new());
        assert_eq!(resolved.n_imputed(), FIELD_COUNT);
        assert_eq!(resolved.get(Field::HistologicGrade), Some(1.0));
        assert_eq!(resolved.get(Field::EstrogenReceptor), Some(90.0));
        assert_eq!(resolved.get(Field::ProgesteroneReceptor), Some(90.0));
        assert_eq!(resolved.get(Field::Bmi), Some(29.4));
        assert_eq!(resolved.get(Field::Age), Some(65.0));
        assert_eq!(resolved.get(Field::HistologicType), Some(2.0));
        assert_eq!(resolved.get(Field::PrimarySurgery), Some(1.0));
        assert_eq!(resolved.get(Field::MyometrialInfiltration), Some(1.0));
        assert_eq!(resolved.get(Field::PreopStage), Some(0.0));
    }

    #[test]
    fn test_partial_input_with_low_grade() {
        let input = PatientInput::new()
            .with(Field::Age, 60_i64)
            .with(Field::RiskGroup, "Intermediate")
            .with(Field::HistologicGrade, "Low(G1-G2)");
        let resolved = resolve(&input);

        assert_eq!(resolved.get(Field::HistologicGrade), Some(1.0));
        assert!(!resolved.was_imputed(Field::HistologicGrade));
        assert_eq!(resolved.get(Field::Age), Some(60.0));
        assert_eq!(resolved.get(Field::RiskGroup), Some(2.0));
        assert_eq!(resolved.get(Field::Bmi), Some(29.4));
        assert_eq!(resolved.get(Field::EstrogenReceptor), Some(90.0));
        assert_eq!(resolved.get(Field::ProgesteroneReceptor), Some(90.0));
        assert!(resolved.was_imputed(Field::EstrogenReceptor));
        assert!(resolved.was_imputed(Field::ProgesteroneReceptor));
        assert_eq!(resolved.n_imputed(), FIELD_COUNT - 3);
    }

    #[test]
    fn test_receptors_follow_resolved_grade() {
        let input = PatientInput::new().with(Field::HistologicGrade, "High(G3)");
        let resolved = resolve(&input);
        assert_eq!(resolved.get(Field::EstrogenReceptor), Some(70.0));
        assert_eq!(resolved.get(Field::ProgesteroneReceptor), Some(25.0));
        assert!(!resolved.was_imputed(Field::HistologicGrade));
    }

    #[test]
    fn test_rejected_value_counts_as_imputed() {
        let input = complete_input().with(Field::FigoStage, "IIIC9");
        let resolved = resolve(&input);
        assert_eq!(resolved.n_imputed(), 1);
        assert_eq!(resolved.imputed_fields(), &[Field::FigoStage]);
        assert_eq!(resolved.get(Field::FigoStage), Some(1.0));
    }

    #[test]
    fn test_imputation_is_idempotent() {
        let input = PatientInput::new()
            .with(Field::Age, 71_i64)
            .with(Field::Lvsi, "Yes");
        let encoded = input.encode(&FeatureCodec::reference());
        let engine = engine();
        assert_eq!(engine.impute(&encoded), engine.impute(&encoded));
    }

    #[test]
    fn test_table_json_round_trip_and_validation() {
        let json = serde_json::to_string(&ImputationTable::reference()).expect("serialize");
        let table: ImputationTable = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(table, ImputationTable::reference());

        let mut broken = table.clone();
        broken.defaults.insert(Field::FigoStage, 15.0);
        assert!(matches!(
            broken.validate(&FeatureCodec::reference()),
            Err(ImputationError::InvalidDefault { .. })
        ));

        let mut missing = table;
        missing.receptor_medians.remove(&2);
        assert_eq!(
            missing.validate(&FeatureCodec::reference()),
            Err(ImputationError::MissingReceptorMedians(2))
        );
    }

    #[test]
    fn test_shipped_table_matches_reference_values() {
        let content = std::fs::read_to_string("models/imputation.json").expect("read table");
        let table: ImputationTable = serde_json::from_str(&content).expect("parse table");
        assert!(table.validate(&FeatureCodec::reference()).is_ok());
        assert_eq!(table.defaults, ImputationTable::reference().defaults);
        assert_eq!(
            table.receptor_medians,
            ImputationTable::reference().receptor_medians
        );
    }
}

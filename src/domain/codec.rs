//! Bidirectional label <-> code mapping for the categorical fields.
//!
//! One table per field, built once and shared. Encoding and decoding read the
//! same table so the two directions cannot drift apart.

use std::collections::BTreeMap;

use super::field::Field;

/// A label or code that is not part of a field's enumeration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MappingError {
    #[error("Unknown label {label:?} for field {field}")]
    UnknownLabel { field: Field, label: String },

    #[error("Unknown code {code} for field {field}")]
    UnknownCode { field: Field, code: f64 },

    #[error("Field {0} is continuous and has no enumeration")]
    NotCategorical(Field),
}

/// Ordered (code, label) pairs for one field.
#[derive(Debug, Clone)]
struct Enumeration {
    entries: Vec<(i64, &'static str)>,
}

impl Enumeration {
    fn new(entries: &[(i64, &'static str)]) -> Self {
        Self {
            entries: entries.to_vec(),
        }
    }

    fn code_of(&self, label: &str) -> Option<i64> {
        if let Some((code, _)) = self.entries.iter().find(|(_, l)| *l == label) {
            return Some(*code);
        }
        let wanted = label.trim().to_lowercase();
        self.entries
            .iter()
            .find(|(_, l)| l.to_lowercase() == wanted)
            .map(|(code, _)| *code)
    }

    fn label_of(&self, code: i64) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, label)| *label)
    }
}

const NO_YES: &[(i64, &str)] = &[(0, "No"), (1, "Yes")];

/// Label <-> code codec for every categorical field.
#[derive(Debug, Clone)]
pub struct FeatureCodec {
    tables: BTreeMap<Field, Enumeration>,
}

impl FeatureCodec {
    /// Build the codec with the enumerations the reference model was trained on.
    #[must_use]
    pub fn reference() -> Self {
        let mut tables = BTreeMap::new();
        tables.insert(
            Field::RiskGroup,
            Enumeration::new(&[
                (1, "Low"),
                (2, "Intermediate"),
                (3, "High-Intermediate"),
                (4, "High"),
                (5, "Advanced-Metastatic"),
            ]),
        );
        tables.insert(
            Field::PreopStage,
            Enumeration::new(&[(0, "Early"), (1, "Locally advanced"), (2, "Advanced")]),
        );
        tables.insert(
            Field::HistologicType,
            Enumeration::new(&[
                (1, "Atypical hyperplasia"),
                (2, "Endometrioid"),
                (3, "Serous"),
                (4, "Clear cell"),
                (5, "Carcinosarcoma"),
                (6, "Undifferentiated"),
                (7, "Mixed"),
                (8, "Mucinous"),
                (9, "Other"),
            ]),
        );
        tables.insert(
            Field::HistologicGrade,
            Enumeration::new(&[(1, "Low(G1-G2)"), (2, "High(G3)")]),
        );
        tables.insert(
            Field::MyometrialInfiltration,
            Enumeration::new(&[(0, "None"), (1, "<50%"), (2, ">=50%"), (3, "Serosa")]),
        );
        tables.insert(
            Field::FigoStage,
            Enumeration::new(&[
                (1, "IA1"),
                (2, "IA2"),
                (3, "IA3"),
                (4, "IB"),
                (5, "IC"),
                (6, "IIA"),
                (7, "IIB"),
                (8, "IIC"),
                (9, "IIIA"),
                (10, "IIIB"),
                (11, "IIIC1"),
                (12, "IIIC2"),
                (13, "IVA"),
                (14, "IVB"),
            ]),
        );
        tables.insert(Field::DistantMetastasis, Enumeration::new(NO_YES));
        tables.insert(Field::PrimarySurgery, Enumeration::new(NO_YES));
        tables.insert(
            Field::SystemicTreatment,
            Enumeration::new(&[(0, "None"), (1, "Reduced dose"), (2, "Full dose")]),
        );
        tables.insert(Field::Lvsi, Enumeration::new(NO_YES));

        Self { tables }
    }

    fn table(&self, field: Field) -> Result<&Enumeration, MappingError> {
        self.tables
            .get(&field)
            .ok_or(MappingError::NotCategorical(field))
    }

    /// Map a label to its code.
    ///
    /// # Errors
    /// `UnknownLabel` if the label is not in the field's enumeration.
    pub fn encode(&self, field: Field, label: &str) -> Result<i64, MappingError> {
        self.table(field)?
            .code_of(label)
            .ok_or_else(|| MappingError::UnknownLabel {
                field,
                label: label.to_string(),
            })
    }

    /// Map a code back to its label.
    ///
    /// Accepts any float that is exactly one of the field's integer codes.
    ///
    /// # Errors
    /// `UnknownCode` if the value is not one of the field's codes.
    pub fn decode(&self, field: Field, code: f64) -> Result<&'static str, MappingError> {
        let table = self.table(field)?;
        let unknown = || MappingError::UnknownCode { field, code };
        if !code.is_finite() || code.fract() != 0.0 {
            return Err(unknown());
        }
        table.label_of(code as i64).ok_or_else(unknown)
    }

    /// Whether `code` is a valid code for `field`.
    #[must_use]
    pub fn is_valid_code(&self, field: Field, code: f64) -> bool {
        self.decode(field, code).is_ok()
    }

    /// The enumerated codes of a categorical field, in ascending order.
    ///
    /// # Errors
    /// `NotCategorical` for continuous fields.
    pub fn codes(&self, field: Field) -> Result<Vec<f64>, MappingError> {
        Ok(self
            .table(field)?
            .entries
            .iter()
            .map(|(code, _)| *code as f64)
            .collect())
    }

    /// All labels of a categorical field, in code order.
    ///
    /// # Errors
    /// `NotCategorical` for continuous fields.
    pub fn labels(&self, field: Field) -> Result<Vec<&'static str>, MappingError> {
        Ok(self
            .table(field)?
            .entries
            .iter()
            .map(|(_, label)| *label)
            .collect())
    }
}

impl Default for FeatureCodec {
    fn default() -> Self {
        Self::reference()
    }
}

//! Patient input as collected by the clinical form.
//!
//! Every field is independently optional. Raw values are either numbers or
//! categorical labels; `encode` turns them into model codes, dropping anything
//! that does not validate so it falls through to imputation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::codec::FeatureCodec;
use super::field::{Field, FieldKind};

/// A raw value for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    /// Yes/No answer for a binary field (`true` -> 1, `false` -> 0)
    Flag(bool),
    Label(String),
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Flag(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Label(v.to_string())
    }
}

/// Raw clinical input: field -> optional value.
///
/// Serializes as a flat JSON object keyed by field key; `null` and missing keys
/// both mean "unset".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientInput {
    values: BTreeMap<Field, Option<FieldValue>>,
}

impl PatientInput {
    /// Empty input (every field unset).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    #[must_use]
    pub fn with(mut self, field: Field, value: impl Into<FieldValue>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: Field, value: impl Into<FieldValue>) {
        self.values.insert(field, Some(value.into()));
    }

    pub fn unset(&mut self, field: Field) {
        self.values.remove(&field);
    }

    #[must_use]
    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.values.get(&field).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn is_set(&self, field: Field) -> bool {
        self.get(field).is_some()
    }

    /// Number of fields carrying a value.
    #[must_use]
    pub fn count_set(&self) -> usize {
        Field::ALL.iter().filter(|f| self.is_set(**f)).count()
    }

    /// Build input from a bulk-import row (column name -> cell text).
    ///
    /// Uses the same rules as manual entry: numeric fields parse and clamp to
    /// their range, categorical fields accept a valid code or label. Anything
    /// else, including empty cells and unknown columns, leaves the field unset.
    #[must_use]
    pub fn from_row<'a, I>(row: I, codec: &FeatureCodec) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut input = Self::new();
        for (column, cell) in row {
            let Some(field) = Field::from_key(column.trim()) else {
                continue;
            };
            let cell = cell.trim();
            if cell.is_empty() {
                continue;
            }
            let raw = match cell.parse::<f64>() {
                Ok(n) => FieldValue::Number(n),
                Err(_) => FieldValue::Label(cell.to_string()),
            };
            if let Some(code) = resolve_value(field, &raw, codec) {
                input.set(field, code);
            } else {
                tracing::debug!("Import: dropping invalid value for {field}");
            }
        }
        input
    }

    /// Resolve every present value to its numeric model code.
    ///
    /// Values that fail validation are dropped (and reported in
    /// `EncodedInput::rejected`) so that imputation fills them.
    #[must_use]
    pub fn encode(&self, codec: &FeatureCodec) -> EncodedInput {
        let mut encoded = EncodedInput::default();
        for field in Field::ALL {
            let Some(raw) = self.get(field) else {
                continue;
            };
            match resolve_value(field, raw, codec) {
                Some(v) => {
                    encoded.values.insert(field, v);
                }
                None => {
                    tracing::warn!("Value for {field} could not be resolved; it will be imputed");
                    encoded.rejected.push(field);
                }
            }
        }
        encoded
    }
}

/// Numeric value for `raw`, or `None` if it is invalid for `field`.
fn resolve_value(field: Field, raw: &FieldValue, codec: &FeatureCodec) -> Option<f64> {
    match (field.kind(), raw) {
        (FieldKind::Continuous { .. }, FieldValue::Number(n)) => field.clamp_value(*n),
        (FieldKind::Continuous { .. }, FieldValue::Label(s)) => {
            s.trim().parse::<f64>().ok().and_then(|n| field.clamp_value(n))
        }
        (FieldKind::Continuous { .. }, FieldValue::Flag(_)) => None,
        (FieldKind::Categorical, FieldValue::Number(n)) => {
            codec.is_valid_code(field, *n).then_some(*n)
        }
        // Only No/Yes fields take a boolean.
        (FieldKind::Categorical, FieldValue::Flag(b)) => codec
            .labels(field)
            .is_ok_and(|labels| labels == ["No", "Yes"])
            .then(|| f64::from(u8::from(*b))),
        (FieldKind::Categorical, FieldValue::Label(s)) => match codec.encode(field, s) {
            Ok(code) => Some(code as f64),
            // Numeric codes typed as text ("2") are accepted too.
            Err(_) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| codec.is_valid_code(field, *n)),
        },
    }
}

/// Patient input after label -> code resolution, before imputation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedInput {
    values: BTreeMap<Field, f64>,
    /// Fields that had a value which failed validation.
    pub rejected: Vec<Field>,
}

impl EncodedInput {
    #[must_use]
    pub fn get(&self, field: Field) -> Option<f64> {
        self.values.get(&field).copied()
    }

    /// Fields with no usable value, in form order.
    #[must_use]
    pub fn unset_fields(&self) -> Vec<Field> {
        Field::ALL
            .iter()
            .copied()
            .filter(|f| !self.values.contains_key(f))
            .collect()
    }
}

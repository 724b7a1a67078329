//! The fixed set of clinical fields collected by the NSMP form.
//!
//! Field keys double as the column names used by the model artifacts and the
//! background cohort CSV.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of tracked clinical fields.
pub const FIELD_COUNT: usize = 14;

/// How a field is represented numerically.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// Enumerated integer codes (see `FeatureCodec`).
    Categorical,
    /// Bounded numeric measurement.
    Continuous {
        min: f64,
        max: f64,
        /// Whether values are whole numbers (age).
        integer: bool,
    },
}

/// A clinical field on the patient form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Age,
    Bmi,
    /// Definitive (post-surgical) risk group
    RiskGroup,
    /// Pre-surgical stage
    PreopStage,
    HistologicType,
    HistologicGrade,
    /// Depth of myometrial infiltration
    MyometrialInfiltration,
    FigoStage,
    DistantMetastasis,
    /// Primary surgical treatment performed
    PrimarySurgery,
    /// Systemic treatment dose level
    SystemicTreatment,
    /// Lymphovascular space invasion
    Lvsi,
    EstrogenReceptor,
    ProgesteroneReceptor,
}

impl Field {
    /// All fields in form order.
    pub const ALL: [Field; FIELD_COUNT] = [
        Field::Age,
        Field::Bmi,
        Field::RiskGroup,
        Field::PreopStage,
        Field::HistologicType,
        Field::HistologicGrade,
        Field::MyometrialInfiltration,
        Field::FigoStage,
        Field::DistantMetastasis,
        Field::PrimarySurgery,
        Field::SystemicTreatment,
        Field::Lvsi,
        Field::EstrogenReceptor,
        Field::ProgesteroneReceptor,
    ];

    /// Column / JSON key.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Bmi => "bmi",
            Self::RiskGroup => "risk_group",
            Self::PreopStage => "preop_stage",
            Self::HistologicType => "histologic_type",
            Self::HistologicGrade => "histologic_grade",
            Self::MyometrialInfiltration => "myometrial_infiltration",
            Self::FigoStage => "figo_stage",
            Self::DistantMetastasis => "distant_metastasis",
            Self::PrimarySurgery => "primary_surgery",
            Self::SystemicTreatment => "systemic_treatment",
            Self::Lvsi => "lvsi",
            Self::EstrogenReceptor => "estrogen_receptor",
            Self::ProgesteroneReceptor => "progesterone_receptor",
        }
    }

    /// Human-readable name for reports.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Age => "Age (years)",
            Self::Bmi => "BMI",
            Self::RiskGroup => "Definitive risk group",
            Self::PreopStage => "Pre-surgical stage",
            Self::HistologicType => "Histologic type",
            Self::HistologicGrade => "Histologic grade",
            Self::MyometrialInfiltration => "Myometrial infiltration",
            Self::FigoStage => "FIGO stage",
            Self::DistantMetastasis => "Distant metastasis",
            Self::PrimarySurgery => "Primary surgical treatment",
            Self::SystemicTreatment => "Systemic treatment",
            Self::Lvsi => "LVSI",
            Self::EstrogenReceptor => "Estrogen receptors (%)",
            Self::ProgesteroneReceptor => "Progesterone receptors (%)",
        }
    }

    #[must_use]
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Age => FieldKind::Continuous {
                min: 18.0,
                max: 120.0,
                integer: true,
            },
            Self::Bmi => FieldKind::Continuous {
                min: 10.0,
                max: 60.0,
                integer: false,
            },
            Self::EstrogenReceptor | Self::ProgesteroneReceptor => FieldKind::Continuous {
                min: 0.0,
                max: 100.0,
                integer: false,
            },
            _ => FieldKind::Categorical,
        }
    }

    #[must_use]
    pub fn is_categorical(&self) -> bool {
        matches!(self.kind(), FieldKind::Categorical)
    }

    /// Look a field up by its key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.key() == key)
    }

    /// Clamp a measurement into the field's valid range.
    ///
    /// Returns `None` for categorical fields and non-finite input.
    #[must_use]
    pub fn clamp_value(&self, value: f64) -> Option<f64> {
        if !value.is_finite() {
            return None;
        }
        match self.kind() {
            FieldKind::Categorical => None,
            FieldKind::Continuous { min, max, integer } => {
                let v = value.clamp(min, max);
                Some(if integer { v.round() } else { v })
            }
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s.trim()).ok_or_else(|| format!("Unknown field: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_round_trip() {
        for field in Field::ALL {
            assert_eq!(Field::from_key(field.key()), Some(field));
        }
        assert_eq!(Field::from_key("tumor_size"), None);
    }

    #[test]
    fn test_serde_uses_keys() {
        let json = serde_json::to_string(&Field::MyometrialInfiltration).expect("serialize");
        assert_eq!(json, "\"myometrial_infiltration\"");
    }

    #[test]
    fn test_clamp() {
        assert_eq!(Field::Age.clamp_value(130.0), Some(120.0));
        assert_eq!(Field::Age.clamp_value(64.6), Some(65.0));
        assert_eq!(Field::Bmi.clamp_value(5.0), Some(10.0));
        assert_eq!(Field::EstrogenReceptor.clamp_value(-3.0), Some(0.0));
        assert_eq!(Field::Lvsi.clamp_value(1.0), None);
        assert_eq!(Field::Bmi.clamp_value(f64::NAN), None);
    }

    #[test]
    fn test_clamp_value_on_owned_fields() {
        for field in Field::ALL {
            let bounded = field.clamp_value(50.0);
            assert_eq!(bounded.is_some(), !field.is_categorical(), "{field}");
        }
    }

    #[test]
    fn test_continuous_fields() {
        let continuous: Vec<_> = Field::ALL.iter().filter(|f| !f.is_categorical()).collect();
        assert_eq!(continuous.len(), 4);
    }
}

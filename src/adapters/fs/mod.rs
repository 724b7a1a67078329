//! Filesystem artifact store.
//!
//! Reads the fitted model and its companion files from one directory:
//!
//! - `selected_features.json`: ordered feature names
//! - `scaler.json`: `{ "mean": [...], "scale": [...] }`
//! - `classifier.json`: versioned, `kind`-tagged model parameters
//! - `imputation.json`: optional imputation table (built-in reference otherwise)
//! - `cohort.csv`: background cohort with an outcome column
//! - `manifest.json`: optional SHA-256 digests binding the files above
//!
//! When a manifest is present every file it lists must match its digest before
//! anything is parsed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::adapters::model::{ClassifierArtifact, FittedClassifier};
use crate::domain::{
    BackgroundCohort, CohortError, FeatureCodec, FeatureSchema, ImputationError, ImputationTable,
    PatientInput, SchemaError, StandardScaler,
};
use crate::ports::{ArtifactStore, Classifier, ModelArtifacts, ModelError};

pub const SELECTED_FEATURES_FILE: &str = "selected_features.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const CLASSIFIER_FILE: &str = "classifier.json";
pub const IMPUTATION_FILE: &str = "imputation.json";
pub const COHORT_FILE: &str = "cohort.csv";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Default name of the cohort's binary outcome column.
pub const DEFAULT_OUTCOME_COLUMN: &str = "recurrence";

/// Artifact loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {file}: {source}")]
    Parse {
        file: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("File hash mismatch for {0}")]
    HashMismatch(String),

    #[error("Inconsistent artifacts: {0}")]
    Schema(#[from] SchemaError),

    #[error("Invalid classifier: {0}")]
    Model(#[from] ModelError),

    #[error("Invalid imputation table: {0}")]
    Imputation(#[from] ImputationError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Cohort is missing column {0}")]
    MissingColumn(String),

    #[error("Cohort row {row}, column {column}: cannot parse {value:?}")]
    BadCell {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Invalid cohort: {0}")]
    Cohort(#[from] CohortError),

    #[error("Import file has no row {0}")]
    NoSuchRow(usize),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ArtifactManifest {
    version: u32,
    files: BTreeMap<String, String>,
}

fn sha256_hex_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// Constant-time compare for ASCII strings (used for SHA-256 hex digests).
fn constant_time_eq_str(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    fs::read(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Artifact store backed by a local directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
    outcome_column: String,
    require_manifest: bool,
}

impl FsArtifactStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            outcome_column: DEFAULT_OUTCOME_COLUMN.to_string(),
            require_manifest: false,
        }
    }

    #[must_use]
    pub fn with_outcome_column(mut self, column: impl Into<String>) -> Self {
        self.outcome_column = column.into();
        self
    }

    /// Refuse to load when `manifest.json` is absent.
    #[must_use]
    pub fn require_manifest(mut self, required: bool) -> Self {
        self.require_manifest = required;
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, file: &'static str) -> Result<T, ArtifactError> {
        let bytes = read_bytes(&self.dir.join(file))?;
        serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Parse { file, source })
    }

    /// Check every file listed in `manifest.json` against its digest.
    ///
    /// Returns whether a manifest was found.
    ///
    /// # Errors
    /// Returns error if the manifest is malformed, lists a missing file, a
    /// digest does not match, or no manifest exists while one is required.
    pub fn verify_manifest(&self) -> Result<bool, ArtifactError> {
        let manifest_path = self.dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            if self.require_manifest {
                return Err(ArtifactError::Manifest(format!(
                    "{MANIFEST_FILE} is required but missing from {:?}",
                    self.dir
                )));
            }
            tracing::warn!("No {MANIFEST_FILE} in {:?}; artifact integrity not verified", self.dir);
            return Ok(false);
        }

        let manifest: ArtifactManifest = self.read_json(MANIFEST_FILE)?;
        if manifest.version != 1 {
            return Err(ArtifactError::Manifest(format!(
                "Unsupported manifest version: {}",
                manifest.version
            )));
        }
        if manifest.files.is_empty() {
            return Err(ArtifactError::Manifest("manifest lists no files".into()));
        }
        for required in [SELECTED_FEATURES_FILE, SCALER_FILE, CLASSIFIER_FILE] {
            if !manifest.files.contains_key(required) {
                return Err(ArtifactError::Manifest(format!(
                    "manifest must bind {required}"
                )));
            }
        }

        for (rel, expected_hex) in &manifest.files {
            if rel.contains("..") || Path::new(rel).is_absolute() {
                return Err(ArtifactError::Manifest(format!(
                    "manifest entry {rel} escapes the artifact directory"
                )));
            }
            let bytes = read_bytes(&self.dir.join(rel))?;
            let actual_hex = sha256_hex_bytes(&bytes);
            if !constant_time_eq_str(&actual_hex, &expected_hex.to_ascii_lowercase()) {
                return Err(ArtifactError::HashMismatch(rel.clone()));
            }
        }

        tracing::info!("Verified {} artifact digests", manifest.files.len());
        Ok(true)
    }
}

impl ArtifactStore for FsArtifactStore {
    type Classifier = FittedClassifier;
    type Error = ArtifactError;

    fn load_model(&self) -> Result<ModelArtifacts<FittedClassifier>, ArtifactError> {
        self.verify_manifest()?;

        let names: Vec<String> = self.read_json(SELECTED_FEATURES_FILE)?;
        let schema = FeatureSchema::new(&names)?;
        let scaler: StandardScaler = self.read_json(SCALER_FILE)?;
        let artifact: ClassifierArtifact = self.read_json(CLASSIFIER_FILE)?;
        artifact.model.validate()?;

        let model = ModelArtifacts {
            version: artifact.version,
            schema,
            scaler,
            classifier: artifact.model,
        };
        model.check_consistency()?;

        tracing::info!(
            "Loaded model {} from {:?} (kind={}, n_features={})",
            model.version,
            self.dir,
            model.classifier.kind(),
            model.schema.len()
        );
        Ok(model)
    }

    fn load_imputation_table(&self) -> Result<ImputationTable, ArtifactError> {
        if !self.dir.join(IMPUTATION_FILE).exists() {
            tracing::info!("No {IMPUTATION_FILE}; using the reference imputation table");
            return Ok(ImputationTable::reference());
        }
        let table: ImputationTable = self.read_json(IMPUTATION_FILE)?;
        table.validate(&FeatureCodec::reference())?;
        tracing::info!("Loaded imputation table {}", table.version);
        Ok(table)
    }

    fn load_cohort(
        &self,
        schema: &FeatureSchema,
        scaler: &StandardScaler,
    ) -> Result<BackgroundCohort, ArtifactError> {
        let path = self.dir.join(COHORT_FILE);
        let mut reader = csv::Reader::from_path(&path)?;
        let headers = reader.headers()?.clone();

        let column_of = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| ArtifactError::MissingColumn(name.to_string()))
        };
        let feature_columns = schema
            .fields()
            .iter()
            .map(|f| column_of(f.key()))
            .collect::<Result<Vec<_>, _>>()?;
        let outcome_column = column_of(&self.outcome_column)?;

        let mut raw = Vec::new();
        let mut outcomes = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let cell = |col: usize| record.get(col).unwrap_or("").trim();
            let bad = |col: usize| ArtifactError::BadCell {
                row,
                column: headers.get(col).unwrap_or("").to_string(),
                value: cell(col).to_string(),
            };

            let values = feature_columns
                .iter()
                .map(|&col| cell(col).parse::<f64>().map_err(|_| bad(col)))
                .collect::<Result<Vec<_>, _>>()?;
            let outcome = match cell(outcome_column) {
                "1" | "1.0" | "true" | "True" | "TRUE" => true,
                "0" | "0.0" | "false" | "False" | "FALSE" => false,
                _ => return Err(bad(outcome_column)),
            };
            raw.push(values);
            outcomes.push(outcome);
        }

        let cohort = BackgroundCohort::new(schema.clone(), raw, outcomes, scaler)?;
        tracing::info!("Loaded background cohort: {} cases", cohort.len());
        Ok(cohort)
    }
}

/// Read one row of a bulk-import CSV as patient input.
///
/// Cells go through the same validation as manual entry; invalid values leave
/// the field unset.
///
/// # Errors
/// Returns error if the file cannot be read or has no such row.
pub fn read_import_row(
    path: &Path,
    row: usize,
    codec: &FeatureCodec,
) -> Result<PatientInput, ArtifactError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let record = reader
        .records()
        .nth(row)
        .ok_or(ArtifactError::NoSuchRow(row))??;

    Ok(PatientInput::from_row(headers.iter().zip(record.iter()), codec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Field;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).expect("write artifact");
    }

    fn write_minimal_artifacts(dir: &Path) {
        write(dir, SELECTED_FEATURES_FILE, r#"["age", "lvsi"]"#);
        write(dir, SCALER_FILE, r#"{"mean": [60.0, 0.5], "scale": [10.0, 0.5]}"#);
        write(
            dir,
            CLASSIFIER_FILE,
            r#"{"version": "t1", "kind": "logistic", "coefficients": [0.5, 1.0], "intercept": -0.2}"#,
        );
        write(
            dir,
            COHORT_FILE,
            "age,lvsi,recurrence\n50,0,0\n70,1,1\n65,1,0\n",
        );
    }

    fn write_manifest(dir: &Path, files: &[&str]) {
        let mut map = BTreeMap::new();
        for name in files {
            let bytes = fs::read(dir.join(name)).expect("read artifact");
            map.insert(name.to_string(), sha256_hex_bytes(&bytes));
        }
        let manifest = ArtifactManifest {
            version: 1,
            files: map,
        };
        write(
            dir,
            MANIFEST_FILE,
            &serde_json::to_string(&manifest).expect("serialize manifest"),
        );
    }

    #[test]
    fn test_load_minimal_artifacts() {
        let temp = tempdir().expect("tempdir");
        write_minimal_artifacts(temp.path());

        let store = FsArtifactStore::new(temp.path());
        let model = store.load_model().expect("load model");
        assert_eq!(model.version, "t1");
        assert_eq!(model.schema.fields(), &[Field::Age, Field::Lvsi]);
        assert_eq!(model.classifier.n_features(), 2);

        let cohort = store
            .load_cohort(&model.schema, &model.scaler)
            .expect("load cohort");
        assert_eq!(cohort.len(), 3);
        assert_eq!(cohort.outcome(1), Some(true));
        assert_eq!(cohort.scaled_rows()[0], vec![-1.0, -1.0]);

        let table = store.load_imputation_table().expect("table");
        assert_eq!(table, ImputationTable::reference());
    }

    #[test]
    fn test_dimension_mismatch_is_fatal() {
        let temp = tempdir().expect("tempdir");
        write_minimal_artifacts(temp.path());
        write(temp.path(), SCALER_FILE, r#"{"mean": [60.0], "scale": [10.0]}"#);

        let err = FsArtifactStore::new(temp.path())
            .load_model()
            .expect_err("must fail");
        assert!(matches!(err, ArtifactError::Schema(SchemaError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_manifest_is_verified() {
        let temp = tempdir().expect("tempdir");
        write_minimal_artifacts(temp.path());
        write_manifest(
            temp.path(),
            &[SELECTED_FEATURES_FILE, SCALER_FILE, CLASSIFIER_FILE, COHORT_FILE],
        );

        let store = FsArtifactStore::new(temp.path()).require_manifest(true);
        assert!(store.verify_manifest().expect("verify"));
        assert!(store.load_model().is_ok());

        // Tamper with a bound file.
        write(
            temp.path(),
            CLASSIFIER_FILE,
            r#"{"version": "t1", "kind": "logistic", "coefficients": [9.0, 9.0], "intercept": 0.0}"#,
        );
        let err = store.load_model().expect_err("must fail");
        assert!(matches!(err, ArtifactError::HashMismatch(ref f) if f == CLASSIFIER_FILE));
    }

    #[test]
    fn test_required_manifest_missing() {
        let temp = tempdir().expect("tempdir");
        write_minimal_artifacts(temp.path());

        let store = FsArtifactStore::new(temp.path()).require_manifest(true);
        assert!(matches!(store.load_model(), Err(ArtifactError::Manifest(_))));

        let relaxed = FsArtifactStore::new(temp.path());
        assert!(!relaxed.verify_manifest().expect("verify"));
    }

    #[test]
    fn test_manifest_missing_file_fails_closed() {
        let temp = tempdir().expect("tempdir");
        write_minimal_artifacts(temp.path());
        write_manifest(temp.path(), &[SELECTED_FEATURES_FILE, SCALER_FILE, CLASSIFIER_FILE]);
        fs::remove_file(temp.path().join(SCALER_FILE)).expect("remove");

        let err = FsArtifactStore::new(temp.path())
            .verify_manifest()
            .expect_err("must fail");
        assert!(matches!(err, ArtifactError::Read { .. }));
    }

    #[test]
    fn test_cohort_errors() {
        let temp = tempdir().expect("tempdir");
        write_minimal_artifacts(temp.path());
        let store = FsArtifactStore::new(temp.path());
        let model = store.load_model().expect("load model");

        write(temp.path(), COHORT_FILE, "age,lvsi,recurrence\n50,x,0\n");
        assert!(matches!(
            store.load_cohort(&model.schema, &model.scaler),
            Err(ArtifactError::BadCell { row: 0, .. })
        ));

        write(temp.path(), COHORT_FILE, "age,lvsi,relapse\n50,0,0\n");
        assert!(matches!(
            store.load_cohort(&model.schema, &model.scaler),
            Err(ArtifactError::MissingColumn(ref c)) if c == "recurrence"
        ));

        let renamed = FsArtifactStore::new(temp.path()).with_outcome_column("relapse");
        assert_eq!(
            renamed
                .load_cohort(&model.schema, &model.scaler)
                .expect("cohort")
                .len(),
            1
        );
    }

    #[test]
    fn test_invalid_imputation_table_is_rejected() {
        let temp = tempdir().expect("tempdir");
        write(
            temp.path(),
            IMPUTATION_FILE,
            r#"{"version": "bad", "defaults": {"age": 65.0}, "receptor_medians": {}}"#,
        );
        let err = FsArtifactStore::new(temp.path())
            .load_imputation_table()
            .expect_err("must fail");
        assert!(matches!(err, ArtifactError::Imputation(_)));
    }

    #[test]
    fn test_read_import_row() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("import.csv");
        fs::write(
            &path,
            "nhc,age,figo_stage,histologic_grade,lvsi\nA-1,66,IIIC1,2,\nA-2,200,20,Low(G1-G2),1\n",
        )
        .expect("write import");

        let codec = FeatureCodec::reference();
        let first = read_import_row(&path, 0, &codec).expect("row 0");
        assert_eq!(first.count_set(), 3);
        assert!(!first.is_set(Field::Lvsi));

        let second = read_import_row(&path, 1, &codec).expect("row 1");
        assert!(second.is_set(Field::Age));
        assert!(!second.is_set(Field::FigoStage));
        assert_eq!(second.count_set(), 3);

        assert!(matches!(
            read_import_row(&path, 5, &codec),
            Err(ArtifactError::NoSuchRow(5))
        ));
    }

    #[test]
    fn test_shipped_artifacts_load() {
        let store = FsArtifactStore::new("models");
        let model = store.load_model().expect("load model");
        assert_eq!(model.schema.len(), 14);
        let cohort = store
            .load_cohort(&model.schema, &model.scaler)
            .expect("cohort");
        assert_eq!(cohort.len(), 80);
        let table = store.load_imputation_table().expect("table");
        assert_eq!(table.version, "nsmp-stats-2024.12");
    }
}

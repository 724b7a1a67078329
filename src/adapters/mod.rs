//! Adapters layer: Concrete implementations of ports.
//!
//! - `fs`: artifact directory loader (JSON model files, cohort CSV, manifest)
//! - `model`: serialized classifiers (logistic regression, boosted trees)
//! - `sanitize`: PII filtering for logs

pub mod fs;
pub mod model;
pub mod sanitize;

pub use fs::ArtifactError;

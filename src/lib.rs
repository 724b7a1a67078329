//! # NEST
//!
//! Recurrence-risk inference for NSMP (no specific molecular profile)
//! endometrial carcinoma.
//!
//! This crate provides:
//! - Clinical label encoding and statistical imputation of missing fields
//! - Calibrated recurrence probability with a three-tier risk classification
//! - Kernel-SHAP attributions, partial dependence and similar-case retrieval
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core clinical types (fields, codec, imputation, results)
//! - `ports`: Trait definitions for classifiers and artifact storage
//! - `adapters`: Concrete implementations (JSON/CSV artifacts, model kinds)
//! - `application`: Use cases orchestrating domain and ports
//! - `config`: Runtime settings from the environment

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use domain::{Field, PatientInput, PredictionResult, RiskTier};

/// Result type for NEST operations
pub type Result<T> = std::result::Result<T, NestError>;

/// Main error type for NEST
#[derive(Debug, thiserror::Error)]
pub enum NestError {
    #[error("Invalid clinical value: {0}")]
    Mapping(#[from] domain::MappingError),

    #[error("Feature schema error: {0}")]
    Schema(#[from] domain::SchemaError),

    #[error("Model error: {0}")]
    Model(#[from] ports::ModelError),

    #[error("Imputation error: {0}")]
    Imputation(#[from] domain::ImputationError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] adapters::ArtifactError),

    #[error("Explanation failed: {0}")]
    Explain(#[from] application::ExplainError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

//! Runtime settings from `NEST_*` environment variables.
//!
//! Every variable is optional. Values that fail to parse or fall outside their
//! valid range are ignored and the default is kept.

use std::path::PathBuf;

use crate::adapters::fs::DEFAULT_OUTCOME_COLUMN;
use crate::application::{
    DEFAULT_BACKGROUND_SIZE, DEFAULT_COALITION_SAMPLES, DEFAULT_SEED, DEFAULT_SIMILAR_CASES,
};

pub const DEFAULT_ARTIFACT_DIR: &str = "models";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Directory holding the model artifacts (`NEST_ARTIFACT_DIR`)
    pub artifact_dir: PathBuf,
    /// Outcome column of the cohort CSV (`NEST_OUTCOME_COLUMN`)
    pub outcome_column: String,
    /// Neighbours returned per case (`NEST_SIMILAR_CASES`)
    pub similar_cases: usize,
    /// Background rows sampled for attribution, at most 20 (`NEST_ATTRIBUTION_BACKGROUND`)
    pub attribution_background: usize,
    /// Coalitions sampled for attribution (`NEST_ATTRIBUTION_SAMPLES`)
    pub attribution_samples: usize,
    /// RNG seed for attribution (`NEST_ATTRIBUTION_SEED`)
    pub attribution_seed: u64,
    /// Refuse to start without `manifest.json` (`NEST_REQUIRE_MANIFEST`)
    pub require_manifest: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            outcome_column: DEFAULT_OUTCOME_COLUMN.to_string(),
            similar_cases: DEFAULT_SIMILAR_CASES,
            attribution_background: DEFAULT_BACKGROUND_SIZE,
            attribution_samples: DEFAULT_COALITION_SAMPLES,
            attribution_seed: DEFAULT_SEED,
            require_manifest: false,
        }
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}

impl Settings {
    /// Read settings from the process environment.
    #[must_use]
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup` (a variable name -> value source).
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("NEST_ARTIFACT_DIR") {
            if !v.trim().is_empty() {
                cfg.artifact_dir = PathBuf::from(v.trim());
            }
        }

        if let Some(v) = lookup("NEST_OUTCOME_COLUMN") {
            if !v.trim().is_empty() {
                cfg.outcome_column = v.trim().to_string();
            }
        }

        if let Some(v) = lookup("NEST_SIMILAR_CASES") {
            if let Ok(k) = v.trim().parse::<usize>() {
                cfg.similar_cases = k;
            }
        }

        if let Some(v) = lookup("NEST_ATTRIBUTION_BACKGROUND") {
            if let Ok(n) = v.trim().parse::<usize>() {
                if (1..=DEFAULT_BACKGROUND_SIZE).contains(&n) {
                    cfg.attribution_background = n;
                }
            }
        }

        if let Some(v) = lookup("NEST_ATTRIBUTION_SAMPLES") {
            if let Ok(n) = v.trim().parse::<usize>() {
                if n > 0 {
                    cfg.attribution_samples = n;
                }
            }
        }

        if let Some(v) = lookup("NEST_ATTRIBUTION_SEED") {
            if let Ok(seed) = v.trim().parse::<u64>() {
                cfg.attribution_seed = seed;
            }
        }

        if let Some(v) = lookup("NEST_REQUIRE_MANIFEST") {
            if let Some(b) = parse_bool(&v) {
                cfg.require_manifest = b;
            }
        }

        cfg
    }
}

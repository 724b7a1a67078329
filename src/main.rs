//! NEST: recurrence-risk inference for NSMP endometrial cancer.
//!
//! Command-line entry point. Reads one case, prints the prediction as JSON.

use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use nest::adapters::fs::{read_import_row, FsArtifactStore};
use nest::adapters::sanitize::SanitizingMakeWriter;
use nest::application::{InferenceService, Session};
use nest::config::Settings;
use nest::domain::{Field, PatientInput};
use nest::ports::Classifier;

#[derive(Debug, Parser)]
#[command(name = "nest", version, about = "Recurrence risk for NSMP endometrial cancer")]
struct Cli {
    /// Artifact directory (overrides NEST_ARTIFACT_DIR)
    #[arg(long)]
    artifacts: Option<PathBuf>,

    /// Patient JSON file; reads stdin when neither this nor --import is given
    #[arg(long, conflicts_with = "import")]
    input: Option<PathBuf>,

    /// Bulk-import CSV to take the case from
    #[arg(long)]
    import: Option<PathBuf>,

    /// Zero-based data row of the import CSV
    #[arg(long, default_value_t = 0, requires = "import")]
    row: usize,

    /// Also compute partial dependence for this feature
    #[arg(long)]
    sweep: Option<Field>,

    /// Number of similar cases to retrieve
    #[arg(long)]
    neighbors: Option<usize>,

    /// Attribution RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Refuse to start without a verified manifest.json
    #[arg(long)]
    require_manifest: bool,
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(dir) = &self.artifacts {
            settings.artifact_dir.clone_from(dir);
        }
        if let Some(k) = self.neighbors {
            settings.similar_cases = k;
        }
        if let Some(seed) = self.seed {
            settings.attribution_seed = seed;
        }
        settings.require_manifest |= self.require_manifest;
    }
}

fn init_logging() -> Result<tracing_appender::non_blocking::WorkerGuard> {
    // stdout carries the JSON result, so `auto` logs to stderr.
    // - file: log to NEST_LOG_FILE
    // - stdout: interleave with the result (for container log collectors)
    let log_mode = std::env::var("NEST_LOG_MODE").unwrap_or_else(|_| "auto".to_string());

    let (writer, guard) = match log_mode.as_str() {
        "file" => {
            let log_file =
                std::env::var("NEST_LOG_FILE").unwrap_or_else(|_| "nest.log".to_string());

            if let Some(parent) = std::path::Path::new(&log_file).parent() {
                // Best-effort: open() below reports the real failure.
                let _ = std::fs::create_dir_all(parent);
            }

            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_file)
                .with_context(|| format!("opening log file {log_file}"))?;
            tracing_appender::non_blocking(file)
        }
        "stdout" => tracing_appender::non_blocking(std::io::stdout()),
        // auto
        _ => tracing_appender::non_blocking(std::io::stderr()),
    };

    let ansi = log_mode != "file" && log_mode != "stdout" && std::io::stderr().is_terminal();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(ansi)
                .with_writer(SanitizingMakeWriter::new(writer)),
        )
        .init();

    Ok(guard)
}

fn read_case<C: Classifier>(cli: &Cli, service: &InferenceService<C>) -> Result<PatientInput> {
    if let Some(path) = &cli.import {
        return read_import_row(path, cli.row, service.codec())
            .with_context(|| format!("importing row {} of {}", cli.row, path.display()));
    }

    let text = match &cli.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading patient JSON from stdin")?;
            buf
        }
    };

    serde_json::from_str(&text).context("parsing patient JSON")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging()?;

    let mut settings = Settings::from_env_or_default();
    cli.apply(&mut settings);

    tracing::info!("Starting NEST...");

    let store = FsArtifactStore::new(settings.artifact_dir.clone())
        .with_outcome_column(settings.outcome_column.clone())
        .require_manifest(settings.require_manifest);
    let service = InferenceService::load(&store, &settings).context("loading artifacts")?;

    let input = read_case(&cli, &service)?;
    let mut session = Session::new(Arc::new(service));

    let result = session.submit(&input).context("scoring case")?;
    let mut output = serde_json::to_value(result)?;

    if let Some(field) = cli.sweep {
        let pd = session
            .sweep(field)
            .with_context(|| format!("partial dependence for {field}"))?;
        output["partial_dependence"] = serde_json::to_value(pd)?;
    }

    println!("{}", serde_json::to_string_pretty(&output)?);

    tracing::info!("NEST shutdown complete.");
    Ok(())
}

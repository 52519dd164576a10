use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use apisurface_core::config::ExtractorConfig;
use apisurface_core::pipeline;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Extracts the public API surface of a TypeScript-dialect package entry
/// point into a reviewable text file and a machine-readable model.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the package's entry module.
    entry_point: PathBuf,

    /// Directory `api-review.md` and `api-model.json` are written into.
    #[arg(short, long, default_value = "out")]
    out_dir: PathBuf,

    /// Escalate warnings to errors, as a CI/release build would.
    #[arg(long)]
    ci: bool,

    /// Skip writing `api-model.json`, emitting only the review file.
    #[arg(long)]
    no_api_model: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    match run() {
        Ok(had_escalated_diagnostics) => {
            if had_escalated_diagnostics {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            error!(error = %err, "extraction failed");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<bool> {
    let args = Args::parse();

    let package_root = args
        .entry_point
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let entry_name = args.entry_point.file_name().context("entry point has no file name")?.to_string_lossy().into_owned();

    let mut config = ExtractorConfig::load_from_env_or_default().context("loading extractor config")?;
    config.entry_point = entry_name;
    config.is_local_build = !args.ci;
    config.emit_api_model = !args.no_api_model;

    info!(entry = %args.entry_point.display(), out = %args.out_dir.display(), "starting extraction");
    let artifacts = pipeline::run_extraction(&package_root, &config).context("running extraction pipeline")?;

    for diagnostic in artifacts.diagnostics.entries() {
        warn!(
            kind = %diagnostic.kind,
            file = %diagnostic.file,
            line = diagnostic.line,
            declaration = %diagnostic.declaration_name,
            "{}",
            diagnostic.message
        );
    }

    std::fs::create_dir_all(&args.out_dir).with_context(|| format!("creating output directory {}", args.out_dir.display()))?;

    let review_path = args.out_dir.join("api-review.md");
    std::fs::write(&review_path, &artifacts.review_file).with_context(|| format!("writing {}", review_path.display()))?;
    info!(path = %review_path.display(), "wrote review file");

    if let Some(model) = &artifacts.api_model {
        let model_path = args.out_dir.join("api-model.json");
        let json = serde_json::to_string_pretty(model).context("serializing api model")?;
        std::fs::write(&model_path, json).with_context(|| format!("writing {}", model_path.display()))?;
        info!(path = %model_path.display(), "wrote api model");
    }

    let escalate_warnings = !config.is_local_build;
    let has_escalated = artifacts.diagnostics.has_errors() || (escalate_warnings && !artifacts.diagnostics.is_empty());
    Ok(has_escalated)
}

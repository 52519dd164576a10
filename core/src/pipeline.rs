//! High-level orchestration (`facade → analyzer → collector → metadata →
//! (span ⇒ review), (graph+metadata ⇒ api model)`) for a single package.
//!
//! Mirrors `codegraph-prep::run::prepare_qdrant_context`'s shape: scan,
//! parse, analyze, export — one public entry point the CLI binary calls,
//! with `tracing` events at each stage boundary.

use std::path::Path;

use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::analyzer::{self, AnalysisResult};
use crate::api_model::{self, ApiItem};
use crate::collector::Collector;
use crate::config::ExtractorConfig;
use crate::diagnostics::Diagnostics;
use crate::error::CoreError;
use crate::facade::program::Program;
use crate::review;

/// Everything a CLI/config front-end needs to write out after a run.
pub struct ExtractionArtifacts {
    pub review_file: String,
    pub api_model: Option<ApiItem>,
    pub diagnostics: Diagnostics,
}

/// Runs the full pipeline over the package rooted at `package_root`,
/// whose entry module is `config.entry_point` (a path relative to
/// `package_root`).
#[tracing::instrument(level = "info", skip(config), fields(root = %package_root.display()))]
pub fn run_extraction(package_root: &Path, config: &ExtractorConfig) -> Result<ExtractionArtifacts, CoreError> {
    let root = dunce::canonicalize(package_root).map_err(|source| CoreError::Read { path: package_root.display().to_string(), source })?;

    let files = scan_package(&root)?;
    info!(files = files.len(), "scanned package");

    let entry_module_key = module_key_for(&config.entry_point);

    let mut diagnostics = Diagnostics::new();
    let program = Program::build(files, &entry_module_key, &mut diagnostics)?;
    info!(entry = %program.display_path(program.entry()), "built program facade");

    let AnalysisResult { mut graph, entry_exports } = analyzer::analyze(&program, &mut diagnostics);
    info!(exports = entry_exports.len(), "analyzed entry exports");

    let collector = Collector::collect(&entry_exports, &graph, &mut diagnostics);
    debug!(entities = collector.entities().len(), "collected entities");
    collector.run_metadata_pass(&mut graph, &program, &mut diagnostics);
    info!("ran metadata pass");

    if diagnostics.has_errors() {
        warn!(count = diagnostics.entries().len(), "diagnostics include errors");
    }

    let review_file = review::generate_review_file(&graph, &program, &collector);

    let package_name = root.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "package".to_string());
    let api_model = config.emit_api_model.then(|| api_model::build_api_model(&graph, &program, &collector, &package_name));
    info!(emitted = api_model.is_some(), "generated artifacts");

    Ok(ExtractionArtifacts { review_file, api_model, diagnostics })
}

/// Walks `root` collecting `.ts` sources (skipping declaration files and
/// common vendor/build directories), returning `(module_key, display_path,
/// source)` triples ready for `Program::build`.
fn scan_package(root: &Path) -> Result<Vec<(String, String, String)>, CoreError> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root).follow_links(true).into_iter().filter_entry(keep_entry);
    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
        if !name.ends_with(".ts") || name.ends_with(".d.ts") {
            continue;
        }

        let source = std::fs::read_to_string(path).map_err(|source| CoreError::Read { path: path.display().to_string(), source })?;
        let module_key = module_key_for(path.strip_prefix(root).unwrap_or(path).to_str().unwrap_or(name));
        let display_path = path.strip_prefix(root).unwrap_or(path).display().to_string();
        debug!(module = %module_key, "discovered module");
        files.push((module_key, display_path, source));
    }

    Ok(files)
}

fn keep_entry(entry: &DirEntry) -> bool {
    if entry.file_type().is_dir()
        && let Some(name) = entry.file_name().to_str()
    {
        return !matches!(name, ".git" | "node_modules" | "dist" | "build" | "target");
    }
    true
}

/// A module key is an import-resolvable, unix-separated path relative to
/// the package root with its `.ts` extension stripped.
fn module_key_for(path: &str) -> String {
    let unix = path
        .split(['/', '\\'])
        .filter(|c| !matches!(*c, "" | "."))
        .collect::<Vec<_>>()
        .join("/");
    unix.strip_suffix(".ts").map(str::to_string).unwrap_or(unix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicU32, Ordering};

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn fresh_temp_dir(label: &str) -> std::path::PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("apisurface-pipeline-test-{label}-{}-{n}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn scans_and_extracts_a_small_package() {
        let dir = fresh_temp_dir("ok");
        fs::write(dir.join("index.ts"), "/**\n * @public\n */\nexport interface Foo { a: string }\n").unwrap();

        let config = ExtractorConfig { entry_point: "index.ts".to_string(), ..ExtractorConfig::default() };
        let artifacts = run_extraction(&dir, &config).unwrap();

        assert!(artifacts.review_file.contains("interface Foo"));
        assert!(artifacts.api_model.is_some());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_entry_point_surfaces_as_core_error() {
        let dir = fresh_temp_dir("missing");
        fs::write(dir.join("other.ts"), "export const x = 1;\n").unwrap();

        let config = ExtractorConfig { entry_point: "index.ts".to_string(), ..ExtractorConfig::default() };
        match run_extraction(&dir, &config) {
            Err(CoreError::MissingEntryPoint(_)) => {}
            other => panic!("expected MissingEntryPoint, got {}", other.is_ok()),
        }

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn module_key_strips_extension_and_normalizes_separators() {
        assert_eq!(module_key_for("index.ts"), "index");
        assert_eq!(module_key_for("a/b/c.ts"), "a/b/c");
    }
}

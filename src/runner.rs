//! One complete extraction run: open the source, run the queue, clean up
//! and write the run summary.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::{info, warn};

use crate::artifacts::builtin_registry;
use crate::cache::FileHandleCache;
use crate::config::ExtractorConfig;
use crate::constants::DEFAULT_SUMMARY_FILE_NAME;
use crate::context::RunContext;
use crate::engine::{ArtifactRegistry, ExecutionEngine, RunOutcome};
use crate::security::validate_input_path;
use crate::sources::{open_source, SourceKind, SourceOptions};
use crate::utils::hash::calculate_sha256;
use crate::utils::summary::{create_run_summary, EvidenceInfo};

/// Where a run reads from and writes to
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub kind: SourceKind,
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub staging_dir: PathBuf,
}

/// Result of a finished run
#[derive(Debug)]
pub struct RunReport {
    pub context: Arc<RunContext>,
    pub registry: ArtifactRegistry,
    pub outcome: RunOutcome,
    pub summary_path: PathBuf,
    /// Run directory under the staging base, for containers that stage files
    pub staging_dir: Option<PathBuf>,
}

/// Run every selected built-in artifact against the request's input.
///
/// Errors returned here are fatal setup errors; artifact failures are
/// recorded in the registry and the summary instead.
pub fn run_extraction(request: &ExtractionRequest, config: &ExtractorConfig) -> Result<RunReport> {
    let mut registry = builtin_registry()?;
    registry.apply_selection(&config.artifacts.selected, config.artifacts.include_long_running)?;
    run_with_registry(request, config, registry)
}

/// Same as [`run_extraction`] with a caller-supplied registry and selection
pub fn run_with_registry(
    request: &ExtractionRequest,
    config: &ExtractorConfig,
    mut registry: ArtifactRegistry,
) -> Result<RunReport> {
    let input = validate_input_path(&request.input)?;
    fs::create_dir_all(&request.output_dir)
        .context(format!("Failed to create output directory: {}", request.output_dir.display()))?;

    let ctx = Arc::new(RunContext::new(&request.staging_dir));
    info!("Run {} started for {} input {}", ctx.run_id(), request.kind, input.display());

    let evidence = describe_evidence(request.kind, &input, config.hash_input);

    let options = SourceOptions {
        case_insensitive: config.cache.case_insensitive,
        keep_staged_files: config.staging.keep_staged_files,
    };
    let source = open_source(request.kind, &input, &ctx, &options)?;

    let mut cache = FileHandleCache::new(source, config.cache.clone());
    let outcome = ExecutionEngine::new(config.engine.clone()).run(&mut registry, &mut cache, &ctx);

    let cache_stats = cache.stats();
    let staging_dir = cache.staging_dir().map(Path::to_path_buf);
    if let Err(e) = cache.close() {
        warn!("Cleanup of the {} source failed: {:#}", request.kind, e);
    }

    let hostname = examiner_hostname();
    let summary_json = create_run_summary(&hostname, &ctx, &evidence, &registry, &outcome, cache_stats)?;
    let summary_path = request.output_dir.join(DEFAULT_SUMMARY_FILE_NAME);
    fs::write(&summary_path, &summary_json)
        .context("Failed to write run summary")?;
    info!("Run summary written to {}", summary_path.display());

    Ok(RunReport {
        context: ctx,
        registry,
        outcome,
        summary_path,
        staging_dir,
    })
}

fn describe_evidence(kind: SourceKind, input: &Path, hash_input: bool) -> EvidenceInfo {
    let sha256 = if hash_input {
        match calculate_sha256(input) {
            Ok(digest) => digest,
            Err(e) => {
                warn!("Failed to hash {}: {}", input.display(), e);
                None
            }
        }
    } else {
        None
    };

    EvidenceInfo {
        kind,
        path: input.to_path_buf(),
        sha256,
    }
}

fn examiner_hostname() -> String {
    hostname::get()
        .map_err(|e| anyhow!("Failed to get hostname: {}", e))
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|e| {
            warn!("{:#}", e);
            "unknown".to_string()
        })
}

use std::path::PathBuf;

use anyhow::{Result, Context};
use serde::{Serialize, Deserialize};
use serde_json::json;

use crate::cache::CacheStats;
use crate::context::RunContext;
use crate::engine::{ArtifactRegistry, RunOutcome};
use crate::sources::SourceKind;

/// The evidence container a run read from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceInfo {
    pub kind: SourceKind,
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// Create a JSON summary of the run.
///
/// Records the run identity, the evidence, the device metadata published by
/// core artifacts and the final status of every artifact that was queued.
///
/// # Example Output
///
/// ```json
/// {
///   "run_id": "550e8400-e29b-41d4-a716-446655440000",
///   "hostname": "examiner-01",
///   "started_at": "2024-01-15T14:30:52+00:00",
///   "evidence": {"kind": "zip", "path": "/cases/7/image.zip"},
///   "device": {"ProductVersion": "16.4.1"},
///   "artifacts": [...]
/// }
/// ```
pub fn create_run_summary(
    hostname: &str,
    ctx: &RunContext,
    evidence: &EvidenceInfo,
    registry: &ArtifactRegistry,
    outcome: &RunOutcome,
    cache_stats: CacheStats,
) -> Result<String> {
    let artifacts: Vec<_> = registry
        .iter()
        .filter(|descriptor| descriptor.should_run())
        .map(|descriptor| descriptor.report_view())
        .collect();

    let summary = json!({
        "run_id": ctx.run_id().to_string(),
        "hostname": hostname,
        "started_at": ctx.started_at(),
        "finished_at": chrono::Utc::now().to_rfc3339(),
        "extractor_version": env!("CARGO_PKG_VERSION"),
        "evidence": evidence,
        "device": ctx.device().snapshot(),
        "totals": {
            "succeeded": outcome.succeeded,
            "failed": outcome.failed,
            "skipped": outcome.skipped,
            "not_started": outcome.not_started,
            "cancelled": outcome.cancelled,
            "elapsed_secs": outcome.elapsed_secs,
        },
        "cache": cache_stats,
        "artifacts": artifacts,
    });

    serde_json::to_string_pretty(&summary).context("Failed to serialize run summary to JSON")
}

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde::{Serialize, Deserialize};

use crate::cache::FileHandle;
use crate::constants::{CORE_PRIORITY, DEFAULT_PRIORITY};
use crate::context::RunContext;
use crate::models::{ArtifactOutput, ArtifactStatus, Row, SearchPattern};

/// Per-artifact processing logic.
///
/// `found` holds the union of every file resolved for the artifact's
/// patterns and is never empty. Handles are borrowed for this call only.
pub trait ArtifactPlugin: Send + Sync {
    fn process(&self, ctx: &RunContext, found: &[Arc<FileHandle>]) -> Result<ArtifactOutput>;
}

impl<F> ArtifactPlugin for F
where
    F: Fn(&RunContext, &[Arc<FileHandle>]) -> Result<ArtifactOutput> + Send + Sync,
{
    fn process(&self, ctx: &RunContext, found: &[Arc<FileHandle>]) -> Result<ArtifactOutput> {
        self(ctx, found)
    }
}

/// Mutable result state of one artifact
#[derive(Debug, Clone)]
pub struct ArtifactResult {
    pub status: ArtifactStatus,
    pub rows: Vec<Row>,
    pub report_headers: Vec<String>,
    pub process_time_secs: f64,
    pub files_found: usize,
    pub last_error: Option<String>,
}

impl Default for ArtifactResult {
    fn default() -> Self {
        ArtifactResult {
            status: ArtifactStatus::Pending,
            rows: Vec::new(),
            report_headers: Vec::new(),
            process_time_secs: 0.0,
            files_found: 0,
            last_error: None,
        }
    }
}

/// One registered artifact: static metadata, search patterns, plugin and
/// the result of its latest run.
pub struct ArtifactDescriptor {
    pub name: String,
    pub category: String,
    pub description: String,
    /// Always runs, before any optional artifact, whatever the selection
    pub core: bool,
    /// Whether the artifact's rows appear in reports
    pub report: bool,
    /// Excluded from select-all unless explicitly requested
    pub long_running: bool,
    pub selected: bool,
    /// Explicit queue priority, overriding the core/optional default
    pub priority: Option<u8>,
    pub patterns: Vec<SearchPattern>,
    pub generate_timeline: bool,
    pub generate_map: bool,
    plugin: Arc<dyn ArtifactPlugin>,
    result: ArtifactResult,
}

impl ArtifactDescriptor {
    pub fn new(name: &str, category: &str, plugin: impl ArtifactPlugin + 'static) -> Self {
        ArtifactDescriptor {
            name: name.to_string(),
            category: category.to_string(),
            description: String::new(),
            core: false,
            report: true,
            long_running: false,
            selected: false,
            priority: None,
            patterns: Vec::new(),
            generate_timeline: false,
            generate_map: false,
            plugin: Arc::new(plugin),
            result: ArtifactResult::default(),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn core(mut self) -> Self {
        self.core = true;
        self
    }

    pub fn report(mut self, report: bool) -> Self {
        self.report = report;
        self
    }

    pub fn long_running(mut self) -> Self {
        self.long_running = true;
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn pattern(mut self, pattern: SearchPattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn timeline(mut self) -> Self {
        self.generate_timeline = true;
        self
    }

    pub fn map(mut self) -> Self {
        self.generate_map = true;
        self
    }

    /// Queue priority; lower runs first
    pub fn effective_priority(&self) -> u8 {
        match self.priority {
            Some(priority) => priority,
            None if self.core => CORE_PRIORITY,
            None => DEFAULT_PRIORITY,
        }
    }

    /// Core artifacts run regardless of selection
    pub fn should_run(&self) -> bool {
        self.core || self.selected
    }

    pub fn plugin(&self) -> Arc<dyn ArtifactPlugin> {
        Arc::clone(&self.plugin)
    }

    pub fn result(&self) -> &ArtifactResult {
        &self.result
    }

    pub fn status(&self) -> ArtifactStatus {
        self.result.status
    }

    /// True once the plugin has run to completion on a non-empty found set
    pub fn processed(&self) -> bool {
        self.result.status == ArtifactStatus::Succeeded
    }

    pub fn rows(&self) -> &[Row] {
        &self.result.rows
    }

    pub fn report_headers(&self) -> &[String] {
        &self.result.report_headers
    }

    pub fn process_time_secs(&self) -> f64 {
        self.result.process_time_secs
    }

    pub fn last_error(&self) -> Option<&str> {
        self.result.last_error.as_deref()
    }

    /// Clear the result of any earlier run
    pub(crate) fn reset(&mut self) {
        self.result = ArtifactResult::default();
    }

    pub(crate) fn set_status(&mut self, status: ArtifactStatus) {
        self.result.status = status;
    }

    pub(crate) fn record_found(&mut self, count: usize) {
        self.result.files_found = count;
    }

    pub(crate) fn record_success(&mut self, output: ArtifactOutput, elapsed_secs: f64) {
        self.result.status = ArtifactStatus::Succeeded;
        self.result.report_headers = output.headers;
        self.result.rows = output.rows;
        self.result.process_time_secs = elapsed_secs;
    }

    pub(crate) fn record_failure(&mut self, error: String, elapsed_secs: f64) {
        self.result.status = ArtifactStatus::Failed;
        self.result.last_error = Some(error);
        self.result.process_time_secs = elapsed_secs;
    }

    /// Read-only view handed to reporting
    pub fn report_view(&self) -> ArtifactReport {
        ArtifactReport {
            name: self.name.clone(),
            category: self.category.clone(),
            core: self.core,
            report: self.report,
            status: self.result.status,
            processed: self.processed(),
            files_found: self.result.files_found,
            row_count: self.result.rows.len(),
            report_headers: self.result.report_headers.clone(),
            process_time_secs: self.result.process_time_secs,
            generate_timeline: self.generate_timeline,
            generate_map: self.generate_map,
            error: self.result.last_error.clone(),
        }
    }
}

impl fmt::Debug for ArtifactDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactDescriptor")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("core", &self.core)
            .field("selected", &self.selected)
            .field("priority", &self.effective_priority())
            .field("patterns", &self.patterns)
            .field("status", &self.result.status)
            .finish()
    }
}

/// Reporting metadata for one artifact after its run
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ArtifactReport {
    pub name: String,
    pub category: String,
    pub core: bool,
    pub report: bool,
    pub status: ArtifactStatus,
    pub processed: bool,
    pub files_found: usize,
    pub row_count: usize,
    pub report_headers: Vec<String>,
    pub process_time_secs: f64,
    pub generate_timeline: bool,
    pub generate_map: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

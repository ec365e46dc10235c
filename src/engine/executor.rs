use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use crossbeam::channel::{self, RecvTimeoutError};
use log::{debug, info, warn};
use serde::{Serialize, Deserialize};

use crate::cache::{FileHandle, FileHandleCache};
use crate::context::RunContext;
use crate::engine::descriptor::{ArtifactDescriptor, ArtifactPlugin};
use crate::engine::registry::ArtifactRegistry;
use crate::models::{ArtifactOutput, ArtifactStatus};

/// Engine settings
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct EngineConfig {
    /// Time budget for one artifact; an overrun marks it failed
    #[serde(default)]
    pub artifact_timeout_secs: Option<u64>,
}

/// Totals for one run of the queue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Artifact names in the order they were dequeued
    pub dispatched: Vec<String>,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Queued artifacts never started because a stop was requested
    pub not_started: usize,
    pub cancelled: bool,
    pub elapsed_secs: f64,
}

/// Drains the artifact queue on a single worker.
///
/// For every dequeued artifact the engine resolves its patterns through
/// the cache, skips it when nothing was found, and otherwise invokes the
/// plugin. Plugin errors and panics are contained: the artifact is marked
/// failed and the queue carries on.
pub struct ExecutionEngine {
    config: EngineConfig,
}

impl ExecutionEngine {
    pub fn new(config: EngineConfig) -> Self {
        ExecutionEngine { config }
    }

    fn timeout(&self) -> Option<Duration> {
        self.config.artifact_timeout_secs.map(Duration::from_secs)
    }

    pub fn run(
        &self,
        registry: &mut ArtifactRegistry,
        cache: &mut FileHandleCache,
        ctx: &Arc<RunContext>,
    ) -> RunOutcome {
        let started = Instant::now();
        let queue = registry.build_queue();
        let mut outcome = RunOutcome::default();

        info!("Processing {} artifact(s)", queue.len());

        for (position, &index) in queue.iter().enumerate() {
            if ctx.stop_requested() {
                outcome.cancelled = true;
                outcome.not_started = queue.len() - position;
                warn!("Stop requested; {} artifact(s) not started", outcome.not_started);
                break;
            }

            let descriptor = registry.descriptor_mut(index);
            outcome.dispatched.push(descriptor.name.clone());

            match self.process_one(descriptor, cache, ctx) {
                ArtifactStatus::Succeeded => outcome.succeeded += 1,
                ArtifactStatus::Failed => outcome.failed += 1,
                _ => outcome.skipped += 1,
            }
        }

        outcome.elapsed_secs = started.elapsed().as_secs_f64();
        info!(
            "Run finished in {:.2}s: {} succeeded, {} failed, {} skipped",
            outcome.elapsed_secs, outcome.succeeded, outcome.failed, outcome.skipped
        );
        outcome
    }

    fn process_one(
        &self,
        descriptor: &mut ArtifactDescriptor,
        cache: &mut FileHandleCache,
        ctx: &Arc<RunContext>,
    ) -> ArtifactStatus {
        descriptor.reset();
        descriptor.set_status(ArtifactStatus::Resolving);

        let found = resolve_all(descriptor, cache);
        descriptor.record_found(found.len());

        if found.is_empty() {
            info!("No files found for {}", descriptor.name);
            descriptor.set_status(ArtifactStatus::Skipped);
            return ArtifactStatus::Skipped;
        }

        info!("Processing {} ({} file(s))", descriptor.name, found.len());
        descriptor.set_status(ArtifactStatus::Running);
        let started = Instant::now();

        let result = invoke(&descriptor.name, descriptor.plugin(), ctx, found, self.timeout());
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(output) => {
                info!(
                    "{} finished in {:.2}s with {} row(s)",
                    descriptor.name, elapsed, output.rows.len()
                );
                descriptor.record_success(output, elapsed);
            }
            Err(e) => {
                warn!("Artifact {} failed: {:#}", descriptor.name, e);
                descriptor.record_failure(format!("{:#}", e), elapsed);
            }
        }

        descriptor.status()
    }
}

/// Union of the files found for every pattern, first occurrence wins
fn resolve_all(descriptor: &ArtifactDescriptor, cache: &mut FileHandleCache) -> Vec<Arc<FileHandle>> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for pattern in &descriptor.patterns {
        let (handles, hit) = cache.resolve(pattern);
        debug!("{}: pattern {} -> {} file(s) (cached: {})", descriptor.name, pattern, handles.len(), hit);

        for handle in handles {
            if seen.insert(handle.path().to_path_buf()) {
                found.push(handle);
            }
        }
    }

    found
}

/// Run a plugin on its own thread, converting panics and overruns to errors.
///
/// A plugin that overruns its budget keeps running detached; its result is
/// discarded.
fn invoke(
    name: &str,
    plugin: Arc<dyn ArtifactPlugin>,
    ctx: &Arc<RunContext>,
    found: Vec<Arc<FileHandle>>,
    timeout: Option<Duration>,
) -> Result<ArtifactOutput> {
    let (tx, rx) = channel::bounded(1);
    let ctx = Arc::clone(ctx);
    let worker_name = name.to_string();

    thread::Builder::new()
        .name(format!("artifact-{}", name))
        .spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| plugin.process(&ctx, &found)));
            if tx.send(result).is_err() {
                debug!("Discarding late result of artifact {}", worker_name);
            }
        })
        .map_err(|e| anyhow!("Failed to start worker thread: {}", e))?;

    let received = match timeout {
        Some(budget) => match rx.recv_timeout(budget) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                return Err(anyhow!("Timed out after {}s", budget.as_secs()));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(anyhow!("Worker thread exited without a result"));
            }
        },
        None => rx.recv().map_err(|_| anyhow!("Worker thread exited without a result"))?,
    };

    match received {
        Ok(result) => result,
        Err(payload) => Err(anyhow!("Plugin panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

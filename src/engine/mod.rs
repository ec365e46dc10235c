//! Artifact registry and execution engine.
//!
//! Descriptors are pure data plus a plugin. The registry holds them and
//! their selection state; the engine orders the runnable ones (core first,
//! then by priority) and drives each through
//! `Pending -> Resolving -> {Skipped | Running -> {Succeeded | Failed}}`.

pub mod descriptor;
pub mod executor;
pub mod registry;

pub use descriptor::{ArtifactDescriptor, ArtifactPlugin, ArtifactReport, ArtifactResult};
pub use executor::{EngineConfig, ExecutionEngine, RunOutcome};
pub use registry::ArtifactRegistry;

//! # rs-extractor
//!
//! Forensic artifact extraction from mobile device images and backups,
//! written in Rust.
//!
//! ## Overview
//!
//! rs-extractor locates known artifact files inside an evidence container
//! (a live directory, a tar or tar.gz image, a zip image, or a
//! hashed-manifest backup), materializes them locally and hands them to
//! artifact plugins that turn each one into headers and rows.
//!
//! ## Features
//!
//! - **Four container types** behind one search interface
//! - **Single-flight pattern cache**: each file pattern is searched once per run
//! - **Priority scheduling**: core artifacts always run first
//! - **Fault isolation**: a failing or panicking plugin never stops the run
//! - **Flexible configuration**: YAML settings with CLI overrides
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use rust_extractor::artifacts::builtin_registry;
//! use rust_extractor::cache::{CacheConfig, FileHandleCache};
//! use rust_extractor::context::RunContext;
//! use rust_extractor::engine::{EngineConfig, ExecutionEngine};
//! use rust_extractor::sources::{open_source, SourceKind, SourceOptions};
//!
//! # fn main() -> anyhow::Result<()> {
//! let ctx = Arc::new(RunContext::new(Path::new("/tmp/staging")));
//! let source = open_source(SourceKind::Zip, Path::new("/cases/image.zip"), &ctx, &SourceOptions::default())?;
//!
//! let mut registry = builtin_registry()?;
//! registry.select_all(false);
//!
//! let mut cache = FileHandleCache::new(source, CacheConfig::default());
//! let outcome = ExecutionEngine::new(EngineConfig::default()).run(&mut registry, &mut cache, &ctx);
//! cache.close()?;
//!
//! println!("{} artifacts processed", outcome.succeeded);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions and argument parsing
//! - [`models`]: Core data models and structures
//! - [`sources`]: Extraction sources for each container type
//! - [`cache`]: File handle cache between artifacts and the source
//! - [`engine`]: Artifact registry and execution engine
//! - [`artifacts`]: Built-in artifact plugins
//! - [`runner`]: One complete extraction run
//! - [`config`]: YAML configuration
//! - [`utils`]: Hashing and run summary
//! - [`security`]: Staging path validation
//! - [`constants`]: Application-wide constants

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Core data models and structures used throughout the application
pub mod models;

/// Per-run state shared by every component
pub mod context;

/// Extraction sources for directories, archives and backups
pub mod sources;

/// File handle cache
pub mod cache;

/// Artifact registry and execution engine
pub mod engine;

/// Built-in artifact plugins
pub mod artifacts;

/// End-to-end extraction run
pub mod runner;

/// Utility functions for hashing and run summaries
pub mod utils;

/// Configuration management
pub mod config;

/// Application constants and configuration values
pub mod constants;

/// Security utilities for path validation
pub mod security;

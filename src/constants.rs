//! Global constants for the rs-extractor application.
//!
//! This module centralizes all hardcoded values to improve maintainability
//! and make configuration changes easier.

// Scheduling constants
/// Queue priority given to core artifacts
pub const CORE_PRIORITY: u8 = 1;

/// Queue priority given to every other artifact unless it declares its own
pub const DEFAULT_PRIORITY: u8 = 10;

// Cache constants
/// Match count above which a pattern's files are kept as bare paths
pub const DEFAULT_HANDLE_LIMIT: usize = 10;

/// Query used to check that a file really is an SQLite database
pub const DATABASE_PROBE_QUERY: &str = "PRAGMA schema_version";

// Hashed-manifest backup constants
/// Index database at the root of a hashed-manifest backup
pub const MANIFEST_DB_NAME: &str = "Manifest.db";

/// Legacy index format that is not supported
pub const LEGACY_MANIFEST_NAME: &str = "Manifest.mbdb";

/// Query returning every real file recorded in the manifest index
pub const MANIFEST_FILES_QUERY: &str =
    "SELECT fileID, relativePath FROM Files WHERE flags = 1 ORDER BY relativePath";

// Buffer sizes
/// Default buffer size for file operations (1MB)
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

// Default file names
pub const DEFAULT_STAGING_DIR_NAME: &str = "staging";
/// Prefix of the per-run directory created under the staging base
pub const STAGING_RUN_PREFIX: &str = "run-";
pub const DEFAULT_LOG_FILE_NAME: &str = "extraction.log";
pub const DEFAULT_SUMMARY_FILE_NAME: &str = "run_summary.json";
pub const DEFAULT_CONFIG_FILE_NAME: &str = "extractor.yaml";

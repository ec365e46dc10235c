//! File handle cache shared by every artifact in a run.
//!
//! ```text
//!  artifact ──pattern──▶ FileHandleCache ──miss──▶ ExtractionSource::search
//!                              │                          │
//!                              ◀────── Vec<Arc<FileHandle>> ◀─ materialize
//! ```

pub mod file_cache;
pub mod handle;

pub use file_cache::{CacheConfig, CacheStats, FileHandleCache};
pub use handle::{FileHandle, HandleKind};

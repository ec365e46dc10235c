//! Utility functions for run bookkeeping.
//!
//! ## Components
//!
//! - **Hashing**: SHA-256 of the input evidence for the run record
//! - **Summary**: JSON run summary written beside the extraction log
//!
//! ### Hashing the Evidence
//!
//! ```no_run
//! use rust_extractor::utils::hash::calculate_sha256;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! match calculate_sha256(Path::new("/cases/7/image.tar.gz"))? {
//!     Some(hash) => println!("SHA-256: {}", hash),
//!     None => println!("Input is a directory"),
//! }
//! # Ok(())
//! # }
//! ```

/// Run summary generation
pub mod summary;

/// Cryptographic hash calculation utilities
pub mod hash;

//! Extraction sources.
//!
//! A source answers glob searches over one kind of evidence container and
//! guarantees that every path it yields exists on local disk. Container
//! backends (tar, zip, hashed-manifest backups) materialize matches into the
//! run's staging directory as a side effect of the search.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              ExtractionSource                │
//! │  ┌─────────┬──────────┬───────┬───────────┐  │
//! │  │Directory│ Tar/TGZ  │  Zip  │ Manifest  │  │
//! │  └─────────┴──────────┴───────┴───────────┘  │
//! ├──────────────────────────────────────────────┤
//! │     PatternMatcher     │    staging helpers  │
//! └──────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::ValueEnum;
use log::info;
use serde::{Serialize, Deserialize};

use crate::context::RunContext;
use crate::models::SearchPattern;

/// Glob matching shared by every backend
pub mod glob;

/// Writing container members into the staging directory
pub mod staging;

/// Live directory backend
pub mod directory;

/// Tar and gzip-compressed tar backend
pub mod tar;

/// Zip backend
pub mod zip;

/// Hashed-manifest backup backend
pub mod manifest;

pub use directory::DirectorySource;
pub use manifest::ManifestSource;
pub use self::tar::TarSource;
pub use self::zip::ZipSource;

/// Lazily produced paths for one search
pub type PathIter<'a> = Box<dyn Iterator<Item = PathBuf> + 'a>;

/// A backend locating files inside one extraction container.
pub trait ExtractionSource: Send {
    /// The container type this source reads
    fn kind(&self) -> SourceKind;

    /// Search for files matching `pattern`.
    ///
    /// The iterator is lazy: archive backends only extract a member when the
    /// iterator reaches it, so a caller that takes the first item never
    /// extracts the rest. An empty iterator means "no match".
    fn search<'a>(&'a mut self, pattern: &SearchPattern) -> Result<PathIter<'a>>;

    /// Release archive handles and staged files at the end of a run
    fn cleanup(&mut self) -> Result<()>;

    /// Run directory holding materialized files, for backends that stage
    fn staging_dir(&self) -> Option<&Path> {
        None
    }
}

/// Type of extraction container given as input
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum SourceKind {
    /// Live directory (file system extraction)
    #[value(name = "fs", alias = "directory")]
    #[serde(rename = "fs")]
    Directory,
    /// Uncompressed tar archive
    #[serde(rename = "tar")]
    Tar,
    /// Gzip-compressed tar archive
    #[value(name = "gz", alias = "tar.gz")]
    #[serde(rename = "gz")]
    TarGz,
    /// Zip archive
    #[serde(rename = "zip")]
    Zip,
    /// Hashed-manifest device backup
    #[value(name = "itunes", alias = "manifest-backup")]
    #[serde(rename = "itunes")]
    ManifestBackup,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Directory => write!(f, "fs"),
            SourceKind::Tar => write!(f, "tar"),
            SourceKind::TarGz => write!(f, "gz"),
            SourceKind::Zip => write!(f, "zip"),
            SourceKind::ManifestBackup => write!(f, "itunes"),
        }
    }
}

/// Options shared by every backend
#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    /// Match patterns case-insensitively
    pub case_insensitive: bool,
    /// Leave the staging directory in place on cleanup
    pub keep_staged_files: bool,
}

/// Open the source for `input`.
///
/// Any failure here is fatal for the run: nothing downstream can work
/// without a source.
pub fn open_source(
    kind: SourceKind,
    input: &Path,
    ctx: &RunContext,
    options: &SourceOptions,
) -> Result<Box<dyn ExtractionSource>> {
    info!("Opening {} source at {}", kind, input.display());

    let source: Box<dyn ExtractionSource> = match kind {
        SourceKind::Directory => Box::new(DirectorySource::new(input, options)?),
        SourceKind::Tar => Box::new(TarSource::new(input, false, ctx.temp_dir(), options)?),
        SourceKind::TarGz => Box::new(TarSource::new(input, true, ctx.temp_dir(), options)?),
        SourceKind::Zip => Box::new(ZipSource::new(input, ctx.temp_dir(), options)?),
        SourceKind::ManifestBackup => Box::new(ManifestSource::new(input, ctx.temp_dir(), options)?),
    };

    Ok(source)
}

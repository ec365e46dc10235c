use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use log::{info, warn};

use crate::constants::DEFAULT_BUFFER_SIZE;
use crate::models::SearchPattern;
use crate::security::path_validator::{normalize_member_name, staged_path};
use crate::sources::glob::PatternMatcher;
use crate::sources::staging::{prepare_parent, StagingDir};
use crate::sources::{ExtractionSource, PathIter, SourceKind, SourceOptions};

type ArchiveReader = Box<dyn Read + Send>;

/// Source over a tar or tar.gz extraction.
///
/// Tar has no central index, so every search streams the member headers
/// from the start of the archive and extracts matches as it reaches them.
pub struct TarSource {
    archive_path: PathBuf,
    gzipped: bool,
    staging: StagingDir,
    archive: Option<::tar::Archive<ArchiveReader>>,
    options: SourceOptions,
}

impl TarSource {
    /// Open the archive, staging matches under a fresh run directory in `staging_base`
    pub fn new(archive_path: &Path, gzipped: bool, staging_base: &Path, options: &SourceOptions) -> Result<Self> {
        if !archive_path.is_file() {
            bail!("Archive not found: {}", archive_path.display());
        }

        // Reading the first header proves the archive is readable before the run starts
        verify_readable(archive_path, gzipped)?;

        let staging = StagingDir::create_in(staging_base, options.keep_staged_files)?;
        let source = TarSource {
            archive_path: archive_path.to_path_buf(),
            gzipped,
            staging,
            archive: None,
            options: options.clone(),
        };
        info!("Opened {} archive {}", source.kind(), archive_path.display());

        Ok(source)
    }
}

fn open_archive(archive_path: &Path, gzipped: bool) -> Result<::tar::Archive<ArchiveReader>> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    let reader = BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file);

    let reader: ArchiveReader = if gzipped {
        Box::new(GzDecoder::new(reader))
    } else {
        Box::new(reader)
    };

    let mut archive = ::tar::Archive::new(reader);
    archive.set_preserve_mtime(true);
    archive.set_preserve_permissions(false);
    Ok(archive)
}

fn verify_readable(archive_path: &Path, gzipped: bool) -> Result<()> {
    let mut archive = open_archive(archive_path, gzipped)?;
    let mut entries = archive.entries()
        .with_context(|| format!("Failed to read archive: {}", archive_path.display()))?;

    if let Some(first) = entries.next() {
        first.with_context(|| format!("Archive is not a readable tar file: {}", archive_path.display()))?;
    }

    Ok(())
}

impl ExtractionSource for TarSource {
    fn kind(&self) -> SourceKind {
        if self.gzipped { SourceKind::TarGz } else { SourceKind::Tar }
    }

    fn search<'a>(&'a mut self, pattern: &SearchPattern) -> Result<PathIter<'a>> {
        let matcher = PatternMatcher::new(&pattern.pattern, self.options.case_insensitive)?;
        let staging_dir = self.staging.path().to_path_buf();
        let archive_path = self.archive_path.clone();

        let opened = open_archive(&self.archive_path, self.gzipped)?;
        let archive = self.archive.insert(opened);
        let entries = archive.entries()
            .with_context(|| format!("Failed to read archive: {}", archive_path.display()))?;

        let matches = TarMatches { entries, matcher, staging_dir, archive_path };
        if pattern.return_on_first_hit {
            Ok(Box::new(matches.take(1)))
        } else {
            Ok(Box::new(matches))
        }
    }

    fn cleanup(&mut self) -> Result<()> {
        self.archive = None;
        self.staging.remove();
        Ok(())
    }

    fn staging_dir(&self) -> Option<&Path> {
        Some(self.staging.path())
    }
}

/// Lazy walk over the members of one archive pass
struct TarMatches<'a> {
    entries: ::tar::Entries<'a, ArchiveReader>,
    matcher: PatternMatcher,
    staging_dir: PathBuf,
    archive_path: PathBuf,
}

impl Iterator for TarMatches<'_> {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            let mut entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    // The stream cannot be resynchronised after a bad header
                    warn!("Stopped reading {}: {}", self.archive_path.display(), e);
                    return None;
                }
            };

            let name = normalize_member_name(&String::from_utf8_lossy(&entry.path_bytes()));
            if name.is_empty() || !self.matcher.is_match(&name) {
                continue;
            }

            match stage_entry(&mut entry, &name, &self.staging_dir) {
                Ok(Some(path)) => return Some(path),
                Ok(None) => continue,
                Err(e) => {
                    warn!("Skipping archive member {}: {:#}", name, e);
                    continue;
                }
            }
        }
    }
}

/// Extract one matching member into the staging tree
fn stage_entry(entry: &mut ::tar::Entry<'_, ArchiveReader>, name: &str, staging_dir: &Path) -> Result<Option<PathBuf>> {
    let dest = staged_path(staging_dir, name)?;
    let entry_type = entry.header().entry_type();

    if entry_type.is_dir() {
        fs::create_dir_all(&dest)
            .with_context(|| format!("Failed to create directory: {}", dest.display()))?;
        return Ok(Some(dest));
    }

    if !entry_type.is_file() {
        warn!("Skipping non-regular archive member {} ({:?})", name, entry_type);
        return Ok(None);
    }

    prepare_parent(&dest)?;
    entry.unpack(&dest)
        .with_context(|| format!("Failed to extract to {}", dest.display()))?;

    Ok(Some(dest))
}

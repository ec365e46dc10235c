use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use log::{info, warn};
use ::zip::ZipArchive;

use crate::models::SearchPattern;
use crate::security::path_validator::{normalize_member_name, staged_path};
use crate::sources::glob::PatternMatcher;
use crate::sources::staging::{set_modified, write_staged_file, StagingDir};
use crate::sources::{ExtractionSource, PathIter, SourceKind, SourceOptions};

/// Source over a zip extraction.
///
/// The central directory is read once when the source is opened; searches
/// walk it by index and extract matching entries on demand.
pub struct ZipSource {
    archive_path: PathBuf,
    staging: StagingDir,
    archive: Option<ZipArchive<File>>,
    options: SourceOptions,
}

impl ZipSource {
    /// Open the archive, staging matches under a fresh run directory in `staging_base`
    pub fn new(archive_path: &Path, staging_base: &Path, options: &SourceOptions) -> Result<Self> {
        if !archive_path.is_file() {
            bail!("Archive not found: {}", archive_path.display());
        }

        let file = File::open(archive_path)
            .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
        let archive = ZipArchive::new(file)
            .with_context(|| format!("Archive is not a readable zip file: {}", archive_path.display()))?;

        info!("Opened zip archive {} ({} entries)", archive_path.display(), archive.len());

        let staging = StagingDir::create_in(staging_base, options.keep_staged_files)?;
        Ok(ZipSource {
            archive_path: archive_path.to_path_buf(),
            staging,
            archive: Some(archive),
            options: options.clone(),
        })
    }
}

impl ExtractionSource for ZipSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Zip
    }

    fn search<'a>(&'a mut self, pattern: &SearchPattern) -> Result<PathIter<'a>> {
        let matcher = PatternMatcher::new(&pattern.pattern, self.options.case_insensitive)?;
        let staging_dir = self.staging.path().to_path_buf();
        let archive = match self.archive.as_mut() {
            Some(archive) => archive,
            None => bail!("Zip source {} has already been cleaned up", self.archive_path.display()),
        };

        let matches = ZipMatches { archive, matcher, staging_dir, next_index: 0 };
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

/// Lazy walk over the central directory for one search
struct ZipMatches<'a> {
    archive: &'a mut ZipArchive<File>,
    matcher: PatternMatcher,
    staging_dir: PathBuf,
    next_index: usize,
}

impl Iterator for ZipMatches<'_> {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        while self.next_index < self.archive.len() {
            let index = self.next_index;
            self.next_index += 1;

            match stage_entry(self.archive, index, &self.matcher, &self.staging_dir) {
                Ok(Some(path)) => return Some(path),
                Ok(None) => continue,
                Err(e) => {
                    warn!("Skipping zip entry {}: {:#}", index, e);
                    continue;
                }
            }
        }
        None
    }
}

/// Extract entry `index` if its name matches
fn stage_entry(
    archive: &mut ZipArchive<File>,
    index: usize,
    matcher: &PatternMatcher,
    staging_dir: &Path,
) -> Result<Option<PathBuf>> {
    let mut entry = archive.by_index(index)
        .with_context(|| format!("Failed to read entry {}", index))?;

    let name = normalize_member_name(entry.name());
    let name = name.trim_end_matches('/').to_string();
    if name.is_empty() || !matcher.is_match(&name) {
        return Ok(None);
    }

    if entry.enclosed_name().is_none() {
        bail!("Path traversal attempt detected: {}", entry.name());
    }
    let dest = staged_path(staging_dir, &name)?;

    if entry.is_dir() {
        fs::create_dir_all(&dest)
            .with_context(|| format!("Failed to create directory: {}", dest.display()))?;
        return Ok(Some(dest));
    }

    if entry.unix_mode().map_or(false, |mode| mode & 0o170000 == 0o120000) {
        warn!("Skipping symbolic link entry {}", name);
        return Ok(None);
    }

    write_staged_file(&mut entry, &dest)
        .with_context(|| format!("Failed to extract {}", name))?;

    if let Some(modified) = zip_time_to_system(entry.last_modified()) {
        set_modified(&dest, modified);
    }

    Ok(Some(dest))
}

/// Convert an MS-DOS timestamp stored in the archive
fn zip_time_to_system(time: ::zip::DateTime) -> Option<SystemTime> {
    let naive = NaiveDate::from_ymd_opt(time.year() as i32, time.month() as u32, time.day() as u32)?
        .and_hms_opt(time.hour() as u32, time.minute() as u32, time.second() as u32)?;
    let seconds = u64::try_from(naive.and_utc().timestamp()).ok()?;
    Some(SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(seconds))
}

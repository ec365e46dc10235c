use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use rusqlite::{Connection, OpenFlags};

use crate::constants::{LEGACY_MANIFEST_NAME, MANIFEST_DB_NAME, MANIFEST_FILES_QUERY};
use crate::models::SearchPattern;
use crate::security::path_validator::staged_path;
use crate::sources::glob::PatternMatcher;
use crate::sources::staging::{copy_preserving_mtime, StagingDir};
use crate::sources::{ExtractionSource, PathIter, SourceKind, SourceOptions};

/// Source over a hashed-manifest device backup.
///
/// Files in the backup are stored under their content hash; the real
/// relative paths only exist in the `Files` table of `Manifest.db`. The
/// table is read into memory once, and matches are copied back to their
/// real relative path under this run's staging directory.
pub struct ManifestSource {
    root: PathBuf,
    staging: StagingDir,
    files: BTreeMap<String, String>,
    /// Paths copied during this run
    staged: HashSet<PathBuf>,
    options: SourceOptions,
}

impl ManifestSource {
    /// Load the manifest, staging matches under a fresh run directory in `staging_base`
    pub fn new(root: &Path, staging_base: &Path, options: &SourceOptions) -> Result<Self> {
        if !root.is_dir() {
            bail!("Backup directory does not exist: {}", root.display());
        }

        let manifest_path = root.join(MANIFEST_DB_NAME);
        if !manifest_path.is_file() {
            if root.join(LEGACY_MANIFEST_NAME).is_file() {
                bail!("Legacy {} backups are not supported: {}", LEGACY_MANIFEST_NAME, root.display());
            }
            bail!("{} not found in backup directory {}", MANIFEST_DB_NAME, root.display());
        }

        let files = read_manifest(&manifest_path)?;
        info!("Loaded {} file records from {}", files.len(), manifest_path.display());

        let staging = StagingDir::create_in(staging_base, options.keep_staged_files)?;
        Ok(ManifestSource {
            root: root.to_path_buf(),
            staging,
            files,
            staged: HashSet::new(),
            options: options.clone(),
        })
    }

    /// Number of real files recorded in the manifest
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Location of the stored blob for a file ID
    pub fn blob_path(&self, file_id: &str) -> PathBuf {
        blob_path(&self.root, file_id)
    }
}

/// Read `relativePath -> fileID` for every real file in the index
fn read_manifest(manifest_path: &Path) -> Result<BTreeMap<String, String>> {
    let conn = Connection::open_with_flags(
        manifest_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("Failed to open {}", manifest_path.display()))?;

    let mut stmt = conn.prepare(MANIFEST_FILES_QUERY)
        .with_context(|| format!("Manifest index is missing or corrupt: {}", manifest_path.display()))?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .context("Failed to query manifest index")?;

    let mut files = BTreeMap::new();
    for row in rows {
        let (file_id, relative_path) = row.context("Failed to read manifest row")?;
        if let Some(previous) = files.insert(relative_path.clone(), file_id) {
            debug!("Duplicate manifest path {} (replacing {})", relative_path, previous);
        }
    }

    Ok(files)
}

/// Blobs live in a sub-directory named after the first two hash characters;
/// older backups keep them flat in the root.
fn blob_path(root: &Path, file_id: &str) -> PathBuf {
    let nested = match file_id.get(..2) {
        Some(prefix) => root.join(prefix).join(file_id),
        None => root.join(file_id),
    };

    if nested.exists() {
        nested
    } else {
        let flat = root.join(file_id);
        if flat.exists() { flat } else { nested }
    }
}

impl ExtractionSource for ManifestSource {
    fn kind(&self) -> SourceKind {
        SourceKind::ManifestBackup
    }

    fn search<'a>(&'a mut self, pattern: &SearchPattern) -> Result<PathIter<'a>> {
        let matcher = PatternMatcher::new(&pattern.pattern, self.options.case_insensitive)?;
        let root = &self.root;
        let staging_dir = self.staging.path();
        let staged = &mut self.staged;

        let matches = self.files
            .iter()
            .filter(move |(relative_path, _)| matcher.is_match(relative_path))
            .filter_map(move |(relative_path, file_id)| {
                match stage_file(root, staging_dir, relative_path, file_id, staged) {
                    Ok(path) => Some(path),
                    Err(e) => {
                        warn!("Skipping backup file {}: {:#}", relative_path, e);
                        None
                    }
                }
            });

        if pattern.return_on_first_hit {
            Ok(Box::new(matches.take(1)))
        } else {
            Ok(Box::new(matches))
        }
    }

    fn cleanup(&mut self) -> Result<()> {
        self.files.clear();
        self.staged.clear();
        self.staging.remove();
        Ok(())
    }

    fn staging_dir(&self) -> Option<&Path> {
        Some(self.staging.path())
    }
}

/// Copy the blob behind `file_id` to its real path in the staging tree.
///
/// A path is copied once per run; a file already on disk that this run did
/// not write is overwritten from the blob.
fn stage_file(
    root: &Path,
    staging_dir: &Path,
    relative_path: &str,
    file_id: &str,
    staged: &mut HashSet<PathBuf>,
) -> Result<PathBuf> {
    let dest = staged_path(staging_dir, relative_path)?;
    if staged.contains(&dest) {
        return Ok(dest);
    }

    let blob = blob_path(root, file_id);
    if !blob.is_file() {
        bail!("Blob {} not found in backup", blob.display());
    }

    copy_preserving_mtime(&blob, &dest)?;
    debug!("Staged {} from {}", relative_path, blob.display());
    staged.insert(dest.clone());
    Ok(dest)
}

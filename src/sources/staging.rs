use std::fs::{self, File};
use std::io::{self, BufWriter, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use uuid::Uuid;

use crate::constants::{DEFAULT_BUFFER_SIZE, STAGING_RUN_PREFIX};

/// Create the parent directories of a staged file
pub fn prepare_parent(dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

/// Stream `reader` into a new file at `dest`
pub fn write_staged_file<R: Read>(reader: &mut R, dest: &Path) -> Result<u64> {
    prepare_parent(dest)?;

    let file = File::create(dest)
        .with_context(|| format!("Failed to create staged file: {}", dest.display()))?;
    let mut writer = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file);
    let written = io::copy(reader, &mut writer)
        .with_context(|| format!("Failed to write staged file: {}", dest.display()))?;

    Ok(written)
}

/// Copy a file into the staging tree, keeping its modification time
pub fn copy_preserving_mtime(source: &Path, dest: &Path) -> Result<u64> {
    prepare_parent(dest)?;

    let copied = fs::copy(source, dest)
        .with_context(|| format!("Failed to copy {} to {}", source.display(), dest.display()))?;

    if let Ok(modified) = fs::metadata(source).and_then(|m| m.modified()) {
        set_modified(dest, modified);
    }

    Ok(copied)
}

/// Apply an original modification time to a staged file
pub fn set_modified(path: &Path, modified: SystemTime) {
    let result = File::options()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(modified));

    if let Err(e) = result {
        debug!("Could not set modification time on {}: {}", path.display(), e);
    }
}

/// Run-scoped directory holding every file one source materializes.
///
/// A fresh `run-<uuid>` directory is created under the configured base, so
/// files left in the base by an earlier run or by the user are never served
/// and never removed. Only the run directory (and the base, when this run
/// created it and it is empty) is deleted at cleanup.
#[derive(Debug)]
pub struct StagingDir {
    base: PathBuf,
    path: PathBuf,
    created_base: bool,
    keep: bool,
}

impl StagingDir {
    pub fn create_in(base: &Path, keep: bool) -> Result<Self> {
        let created_base = !base.exists();
        fs::create_dir_all(base)
            .with_context(|| format!("Failed to create staging directory: {}", base.display()))?;

        let path = base.join(format!("{}{}", STAGING_RUN_PREFIX, Uuid::new_v4()));
        fs::create_dir(&path)
            .with_context(|| format!("Failed to create run staging directory: {}", path.display()))?;
        debug!("Staging files under {}", path.display());

        Ok(StagingDir {
            base: base.to_path_buf(),
            path,
            created_base,
            keep,
        })
    }

    /// Directory the current run writes into
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove this run's directory unless the files are being kept
    pub fn remove(&self) {
        if self.keep {
            info!("Keeping staged files at {}", self.path.display());
            return;
        }

        if !self.path.exists() {
            return;
        }

        match fs::remove_dir_all(&self.path) {
            Ok(()) => info!("Removed staging directory {}", self.path.display()),
            Err(e) => {
                warn!("Failed to remove staging directory {}: {}", self.path.display(), e);
                return;
            }
        }

        // Only succeeds when the base is empty
        if self.created_base {
            if let Err(e) = fs::remove_dir(&self.base) {
                debug!("Leaving staging base {} in place: {}", self.base.display(), e);
            }
        }
    }
}

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::models::SearchPattern;
use crate::sources::glob::PatternMatcher;
use crate::sources::{ExtractionSource, PathIter, SourceKind, SourceOptions};

/// One file or directory found under the root
#[derive(Debug, Clone)]
struct InventoryEntry {
    path: PathBuf,
    relative: String,
}

/// Source over an already-extracted file system tree.
///
/// The whole tree is walked once when the source is created; searches only
/// filter that inventory and never touch the disk again.
pub struct DirectorySource {
    root: PathBuf,
    inventory: Vec<InventoryEntry>,
    case_insensitive: bool,
}

impl DirectorySource {
    pub fn new(root: &Path, options: &SourceOptions) -> Result<Self> {
        if !root.exists() {
            bail!("Input directory does not exist: {}", root.display());
        }
        if !root.is_dir() {
            bail!("Input path is not a directory: {}", root.display());
        }

        let root = root.canonicalize()
            .with_context(|| format!("Failed to canonicalize {}", root.display()))?;
        let inventory = build_inventory(&root);
        info!("Indexed {} entries under {}", inventory.len(), root.display());

        Ok(DirectorySource {
            root,
            inventory,
            case_insensitive: options.case_insensitive,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of files and directories found under the root
    pub fn len(&self) -> usize {
        self.inventory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inventory.is_empty()
    }
}

/// Walk `root` in file-name order so searches are deterministic
fn build_inventory(root: &Path) -> Vec<InventoryEntry> {
    let mut inventory = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        let path = entry.path().to_path_buf();
        let relative = match path.strip_prefix(root) {
            Ok(relative) => relative.to_string_lossy().replace('\\', "/"),
            Err(_) => {
                debug!("Entry {} is outside the root, skipping", path.display());
                continue;
            }
        };

        inventory.push(InventoryEntry { path, relative });
    }

    inventory
}

impl ExtractionSource for DirectorySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Directory
    }

    fn search<'a>(&'a mut self, pattern: &SearchPattern) -> Result<PathIter<'a>> {
        let matcher = PatternMatcher::new(&pattern.pattern, self.case_insensitive)?;

        let matches = self.inventory
            .iter()
            .filter(move |entry| matcher.is_match(&entry.relative))
            .map(|entry| entry.path.clone());

        if pattern.return_on_first_hit {
            Ok(Box::new(matches.take(1)))
        } else {
            Ok(Box::new(matches))
        }
    }

    fn cleanup(&mut self) -> Result<()> {
        self.inventory.clear();
        Ok(())
    }
}

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use log::{debug, info, warn};
use serde::{Serialize, Deserialize};

use crate::cache::handle::{FileHandle, HandleKind};
use crate::constants::DEFAULT_HANDLE_LIMIT;
use crate::models::SearchPattern;
use crate::sources::{ExtractionSource, SourceKind};

/// Cache behaviour settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    /// Match count above which handles are kept as bare paths
    #[serde(default = "default_handle_limit")]
    pub handle_limit: usize,
    /// Key entries by pattern and options instead of the pattern string alone
    #[serde(default)]
    pub strict_pattern_options: bool,
    /// Match patterns case-insensitively
    #[serde(default)]
    pub case_insensitive: bool,
}

fn default_handle_limit() -> usize {
    DEFAULT_HANDLE_LIMIT
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            handle_limit: DEFAULT_HANDLE_LIMIT,
            strict_pattern_options: false,
            case_insensitive: false,
        }
    }
}

/// Files resolved for one pattern key
struct CacheEntry {
    /// Options of the pattern that resolved this entry first
    resolved_with: SearchPattern,
    handles: Vec<Arc<FileHandle>>,
}

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub searches: usize,
    pub hits: usize,
    pub handles: usize,
}

/// Run-scoped cache sitting between artifacts and the extraction source.
///
/// Each pattern key is searched at most once per run, whichever artifact
/// asks first. Empty results are cached as well, so a pattern that matched
/// nothing is never searched again. The cache owns every open handle and
/// the source itself; [`FileHandleCache::close`] releases both.
pub struct FileHandleCache {
    source: Box<dyn ExtractionSource>,
    config: CacheConfig,
    entries: HashMap<String, CacheEntry>,
    logged: HashSet<String>,
    stats: CacheStats,
}

impl FileHandleCache {
    pub fn new(source: Box<dyn ExtractionSource>, config: CacheConfig) -> Self {
        FileHandleCache {
            source,
            config,
            entries: HashMap::new(),
            logged: HashSet::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source.kind()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Run directory the source stages files into, if it stages any
    pub fn staging_dir(&self) -> Option<&Path> {
        self.source.staging_dir()
    }

    /// True once `pattern` has been resolved in this run
    pub fn is_resolved(&self, pattern: &SearchPattern) -> bool {
        self.entries.contains_key(&self.key_for(pattern))
    }

    fn key_for(&self, pattern: &SearchPattern) -> String {
        if self.config.strict_pattern_options {
            format!(
                "{}\u{0}{}{}",
                pattern.pattern,
                u8::from(pattern.file_names_only),
                u8::from(pattern.return_on_first_hit)
            )
        } else {
            pattern.pattern.clone()
        }
    }

    /// Resolve `pattern` to its file handles.
    ///
    /// Returns the handles and whether they came from the cache. Search
    /// failures are logged and treated as "no match".
    pub fn resolve(&mut self, pattern: &SearchPattern) -> (Vec<Arc<FileHandle>>, bool) {
        let key = self.key_for(pattern);

        if let Some(entry) = self.entries.get(&key) {
            if !entry.resolved_with.same_options(pattern) {
                warn!(
                    "Pattern {} was already resolved with different options; reusing the earlier result",
                    pattern
                );
            }
            self.stats.hits += 1;
            return (entry.handles.clone(), true);
        }

        let paths = self.search(pattern);
        let handles = self.materialize(pattern, paths);

        self.log_once(&key, pattern, &handles);
        self.stats.handles += handles.len();
        self.entries.insert(key, CacheEntry {
            resolved_with: pattern.clone(),
            handles: handles.clone(),
        });

        (handles, false)
    }

    fn search(&mut self, pattern: &SearchPattern) -> Vec<PathBuf> {
        self.stats.searches += 1;

        let found = match self.source.search(pattern) {
            Ok(iter) => {
                if pattern.return_on_first_hit {
                    iter.take(1).collect()
                } else {
                    iter.collect()
                }
            }
            Err(e) => {
                warn!("Search for {} failed: {:#}", pattern, e);
                Vec::new()
            }
        };

        dedupe(found)
    }

    fn materialize(&self, pattern: &SearchPattern, paths: Vec<PathBuf>) -> Vec<Arc<FileHandle>> {
        let path_only = pattern.file_names_only || paths.len() > self.config.handle_limit;

        paths
            .into_iter()
            .map(|path| {
                let handle = if path_only {
                    FileHandle::path_only(&path)
                } else {
                    FileHandle::materialize(&path)
                };
                debug!("Materialized {} as {}", path.display(), handle.kind());
                Arc::new(handle)
            })
            .collect()
    }

    fn log_once(&mut self, key: &str, pattern: &SearchPattern, handles: &[Arc<FileHandle>]) {
        if !self.logged.insert(key.to_string()) {
            return;
        }

        if handles.is_empty() {
            info!("No files found for pattern {}", pattern);
        } else {
            let open = handles.iter().filter(|h| h.kind() != HandleKind::PathOnly).count();
            info!("Pattern {} matched {} file(s), {} opened", pattern, handles.len(), open);
        }
    }

    /// Downgrade every cached handle to a bare path, closing open files.
    ///
    /// Handles still borrowed by a running artifact are left open.
    pub fn release_handles(&mut self) -> usize {
        let mut released = 0;
        for entry in self.entries.values_mut() {
            for handle in entry.handles.iter_mut() {
                if handle.kind() == HandleKind::PathOnly {
                    continue;
                }
                if let Some(owned) = Arc::get_mut(handle) {
                    owned.downgrade();
                    released += 1;
                }
            }
        }
        debug!("Released {} open handle(s)", released);
        released
    }

    /// Drop every cached handle and clean up the source
    pub fn close(&mut self) -> Result<()> {
        self.entries.clear();
        self.logged.clear();
        self.source.cleanup()
    }
}

/// Keep the first occurrence of each path, preserving source order
fn dedupe(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths.into_iter().filter(|path| seen.insert(path.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::PathIter;
    use rusqlite::Connection;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Source returning a fixed list of files and counting searches
    struct CountingSource {
        files: Vec<PathBuf>,
        searches: Arc<AtomicUsize>,
    }

    impl ExtractionSource for CountingSource {
        fn kind(&self) -> SourceKind {
            SourceKind::Directory
        }

        fn search<'a>(&'a mut self, pattern: &SearchPattern) -> Result<PathIter<'a>> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            let suffix = pattern.pattern.trim_start_matches("**/*").to_string();
            Ok(Box::new(self.files.iter().filter(move |p| p.to_string_lossy().ends_with(&suffix)).cloned()))
        }

        fn cleanup(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn create_files(dir: &Path, count: usize, extension: &str) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = dir.join(format!("file{:02}.{}", i, extension));
                let conn = Connection::open(&path).unwrap();
                conn.execute_batch("CREATE TABLE t (v INTEGER);").unwrap();
                path
            })
            .collect()
    }

    fn counting_cache(files: Vec<PathBuf>, config: CacheConfig) -> (FileHandleCache, Arc<AtomicUsize>) {
        let searches = Arc::new(AtomicUsize::new(0));
        let source = CountingSource { files, searches: Arc::clone(&searches) };
        (FileHandleCache::new(Box::new(source), config), searches)
    }

    #[test]
    fn test_single_flight_per_pattern() {
        let temp_dir = TempDir::new().unwrap();
        let files = create_files(temp_dir.path(), 2, "db");
        let (mut cache, searches) = counting_cache(files, CacheConfig::default());
        let pattern = SearchPattern::new("**/*.db");

        let (first, hit) = cache.resolve(&pattern);
        assert!(!hit);
        assert_eq!(first.len(), 2);

        for _ in 0..5 {
            let (again, hit) = cache.resolve(&pattern);
            assert!(hit);
            assert!(Arc::ptr_eq(&first[0], &again[0]));
        }

        assert_eq!(searches.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats(), CacheStats { searches: 1, hits: 5, handles: 2 });
    }

    #[test]
    fn test_empty_results_are_cached() {
        let (mut cache, searches) = counting_cache(Vec::new(), CacheConfig::default());
        let pattern = SearchPattern::new("**/*.none");

        assert!(cache.resolve(&pattern).0.is_empty());
        assert!(cache.resolve(&pattern).0.is_empty());
        assert!(cache.is_resolved(&pattern));
        assert_eq!(searches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handle_limit_switches_to_paths() {
        let temp_dir = TempDir::new().unwrap();
        let files = create_files(temp_dir.path(), DEFAULT_HANDLE_LIMIT + 1, "db");
        let (mut cache, _) = counting_cache(files, CacheConfig::default());

        let (handles, _) = cache.resolve(&SearchPattern::new("**/*.db"));
        assert_eq!(handles.len(), DEFAULT_HANDLE_LIMIT + 1);
        assert!(handles.iter().all(|h| h.kind() == HandleKind::PathOnly));
    }

    #[test]
    fn test_small_result_sets_are_opened() {
        let temp_dir = TempDir::new().unwrap();
        let mut files = create_files(temp_dir.path(), DEFAULT_HANDLE_LIMIT, "db");
        let text = temp_dir.path().join("notes.db");
        fs::write(&text, b"plain text, not sqlite").unwrap();
        files.push(text);
        files.remove(0);
        let (mut cache, _) = counting_cache(files, CacheConfig::default());

        let (handles, _) = cache.resolve(&SearchPattern::new("**/*.db"));
        assert_eq!(handles.len(), DEFAULT_HANDLE_LIMIT);
        let streams = handles.iter().filter(|h| h.kind() == HandleKind::OpenStream).count();
        let databases = handles.iter().filter(|h| h.kind() == HandleKind::OpenDatabase).count();
        assert_eq!(streams, 1);
        assert_eq!(databases, DEFAULT_HANDLE_LIMIT - 1);
    }

    #[test]
    fn test_file_names_only() {
        let temp_dir = TempDir::new().unwrap();
        let files = create_files(temp_dir.path(), 1, "db");
        let (mut cache, _) = counting_cache(files, CacheConfig::default());

        let (handles, _) = cache.resolve(&SearchPattern::new("**/*.db").file_names_only());
        assert_eq!(handles[0].kind(), HandleKind::PathOnly);
    }

    #[test]
    fn test_first_hit_takes_one() {
        let temp_dir = TempDir::new().unwrap();
        let files = create_files(temp_dir.path(), 3, "db");
        let expected = files[0].clone();
        let (mut cache, _) = counting_cache(files, CacheConfig::default());

        let (handles, _) = cache.resolve(&SearchPattern::new("**/*.db").first_hit());
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].path(), expected.as_path());
    }

    #[test]
    fn test_first_resolver_options_win() {
        let temp_dir = TempDir::new().unwrap();
        let files = create_files(temp_dir.path(), 3, "db");
        let (mut cache, searches) = counting_cache(files, CacheConfig::default());

        let (first, _) = cache.resolve(&SearchPattern::new("**/*.db").first_hit());
        let (second, hit) = cache.resolve(&SearchPattern::new("**/*.db"));

        assert!(hit);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(searches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_strict_options_keys_separately() {
        let temp_dir = TempDir::new().unwrap();
        let files = create_files(temp_dir.path(), 3, "db");
        let config = CacheConfig { strict_pattern_options: true, ..CacheConfig::default() };
        let (mut cache, searches) = counting_cache(files, config);

        let (first, _) = cache.resolve(&SearchPattern::new("**/*.db").first_hit());
        let (second, hit) = cache.resolve(&SearchPattern::new("**/*.db"));

        assert!(!hit);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 3);
        assert_eq!(searches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_release_handles() {
        let temp_dir = TempDir::new().unwrap();
        let files = create_files(temp_dir.path(), 2, "db");
        let (mut cache, _) = counting_cache(files, CacheConfig::default());
        let pattern = SearchPattern::new("**/*.db");

        let (handles, _) = cache.resolve(&pattern);
        // Still borrowed, so nothing can be released
        assert_eq!(cache.release_handles(), 0);
        drop(handles);

        assert_eq!(cache.release_handles(), 2);
        let (handles, hit) = cache.resolve(&pattern);
        assert!(hit);
        assert!(handles.iter().all(|h| h.kind() == HandleKind::PathOnly));
    }

    #[test]
    fn test_close_clears_entries() {
        let temp_dir = TempDir::new().unwrap();
        let files = create_files(temp_dir.path(), 1, "db");
        let (mut cache, _) = counting_cache(files, CacheConfig::default());
        let pattern = SearchPattern::new("**/*.db");

        cache.resolve(&pattern);
        cache.close().unwrap();
        assert!(!cache.is_resolved(&pattern));
    }
}

//! Glob pattern matching over container-relative paths.

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};

use crate::security::path_validator::normalize_member_name;

/// Compiled form of a search pattern.
///
/// Candidates are matched by their path relative to the container root,
/// with forward slashes and without a leading `/` or `./`. Wildcards cross
/// separators, so `*/Library/sms.db` and `**/sms.db` both match
/// `private/var/mobile/Library/sms.db`.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    matcher: GlobMatcher,
}

impl PatternMatcher {
    pub fn new(pattern: &str, case_insensitive: bool) -> Result<Self> {
        let normalized = normalize_member_name(pattern.trim());
        let glob = GlobBuilder::new(&normalized)
            .literal_separator(false)
            .case_insensitive(case_insensitive)
            .build()
            .with_context(|| format!("Invalid search pattern: {}", pattern))?;

        Ok(PatternMatcher {
            matcher: glob.compile_matcher(),
        })
    }

    /// Match a container-relative path
    pub fn is_match(&self, relative_path: &str) -> bool {
        let candidate = normalize_member_name(relative_path);
        self.matcher.is_match(candidate.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, path: &str) -> bool {
        PatternMatcher::new(pattern, false).unwrap().is_match(path)
    }

    #[test]
    fn test_double_star_matches_any_depth() {
        assert!(matches("**/*.sqlite", "A/x.sqlite"));
        assert!(matches("**/*.sqlite", "A/B/C/y.sqlite"));
        assert!(matches("**/*.sqlite", "z.sqlite"));
        assert!(!matches("**/*.sqlite", "A/x.sqlite-wal"));
    }

    #[test]
    fn test_single_star_crosses_separators() {
        assert!(matches("*/mobile/Library/SMS/sms.db", "private/var/mobile/Library/SMS/sms.db"));
        assert!(matches("*sms.db", "private/var/mobile/Library/SMS/sms.db"));
        assert!(!matches("*/mobile/Library/SMS/sms.db", "private/var/root/Library/SMS/sms.db"));
    }

    #[test]
    fn test_leading_separators_are_ignored() {
        assert!(matches("/Library/foo.plist", "Library/foo.plist"));
        assert!(matches("Library/foo.plist", "./Library/foo.plist"));
        assert!(matches("**/foo.plist", "/Library/foo.plist"));
    }

    #[test]
    fn test_case_sensitivity() {
        assert!(!matches("**/History.db", "Safari/history.db"));

        let insensitive = PatternMatcher::new("**/History.db", true).unwrap();
        assert!(insensitive.is_match("Safari/history.db"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(PatternMatcher::new("**/[unclosed", false).is_err());
    }
}

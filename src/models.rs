use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Serialize, Deserialize};

/// One output record produced by an artifact
pub type Row = Vec<serde_json::Value>;

/// A glob-style file search declared by an artifact.
///
/// `*` and `**` both cross directory separators, the same way shell-style
/// `fnmatch` matching behaves against full paths. Two patterns are equal
/// when their pattern strings are equal, whatever their options.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SearchPattern {
    pub pattern: String,
    /// Only return bare paths, never open the matches
    #[serde(default)]
    pub file_names_only: bool,
    /// Stop at the first match instead of enumerating every match
    #[serde(default)]
    pub return_on_first_hit: bool,
}

impl SearchPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        SearchPattern {
            pattern: pattern.into(),
            file_names_only: false,
            return_on_first_hit: false,
        }
    }

    pub fn file_names_only(mut self) -> Self {
        self.file_names_only = true;
        self
    }

    pub fn first_hit(mut self) -> Self {
        self.return_on_first_hit = true;
        self
    }

    /// True if both patterns were declared with the same options
    pub fn same_options(&self, other: &SearchPattern) -> bool {
        self.file_names_only == other.file_names_only
            && self.return_on_first_hit == other.return_on_first_hit
    }
}

impl PartialEq for SearchPattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for SearchPattern {}

impl Hash for SearchPattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pattern.hash(state);
    }
}

impl fmt::Display for SearchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pattern)
    }
}

/// Headers and rows produced by one artifact invocation
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ArtifactOutput {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl ArtifactOutput {
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        ArtifactOutput { headers, rows }
    }
}

/// Execution state of one artifact within a run
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactStatus {
    Pending,
    Resolving,
    Skipped,
    Running,
    Succeeded,
    Failed,
}

impl ArtifactStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ArtifactStatus::Skipped | ArtifactStatus::Succeeded | ArtifactStatus::Failed)
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactStatus::Pending => write!(f, "pending"),
            ArtifactStatus::Resolving => write!(f, "resolving"),
            ArtifactStatus::Skipped => write!(f, "skipped"),
            ArtifactStatus::Running => write!(f, "running"),
            ArtifactStatus::Succeeded => write!(f, "succeeded"),
            ArtifactStatus::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_pattern_equality_ignores_options() {
        let plain = SearchPattern::new("**/sms.db");
        let first = SearchPattern::new("**/sms.db").first_hit().file_names_only();

        assert_eq!(plain, first);
        assert!(!plain.same_options(&first));

        let mut set = HashSet::new();
        set.insert(plain);
        set.insert(first);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_pattern_builders() {
        let pattern = SearchPattern::new("*/Library/*.plist");
        assert!(!pattern.file_names_only);
        assert!(!pattern.return_on_first_hit);

        let pattern = pattern.first_hit();
        assert!(pattern.return_on_first_hit);
        assert_eq!(pattern.to_string(), "*/Library/*.plist");
    }

    #[test]
    fn test_terminal_states() {
        assert!(ArtifactStatus::Skipped.is_terminal());
        assert!(ArtifactStatus::Succeeded.is_terminal());
        assert!(ArtifactStatus::Failed.is_terminal());
        assert!(!ArtifactStatus::Pending.is_terminal());
        assert!(!ArtifactStatus::Resolving.is_terminal());
        assert!(!ArtifactStatus::Running.is_terminal());
    }

    #[test]
    fn test_status_serialization() {
        let serialized = serde_json::to_string(&ArtifactStatus::Skipped).unwrap();
        assert_eq!(serialized, "\"Skipped\"");
        assert_eq!(ArtifactStatus::Failed.to_string(), "failed");
    }
}

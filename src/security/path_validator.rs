//! Path validation utilities for preventing path traversal attacks.
//!
//! Archive members and manifest entries name their own paths, so every one of
//! them goes through [`staged_path`] before anything is written to disk.

use anyhow::{anyhow, bail, Context, Result};
use std::path::{Component, Path, PathBuf};

/// Normalize a container member name for matching and staging.
///
/// Backslashes become forward slashes and leading `./` or `/` segments are
/// dropped, so `./private/var/mobile` and `/private/var/mobile` both become
/// `private/var/mobile`.
pub fn normalize_member_name(name: &str) -> String {
    let mut normalized = name.replace('\\', "/");
    loop {
        if let Some(rest) = normalized.strip_prefix("./") {
            normalized = rest.to_string();
        } else if let Some(rest) = normalized.strip_prefix('/') {
            normalized = rest.to_string();
        } else {
            break;
        }
    }
    normalized
}

/// Resolve where a container member is staged inside `staging_dir`.
///
/// # Arguments
///
/// * `staging_dir` - The run's temp staging directory
/// * `member` - The member name as recorded by the container
///
/// # Returns
///
/// * `Ok(PathBuf)` - `staging_dir` joined with the member's relative path
/// * `Err` - If the member would resolve outside `staging_dir`
///
/// # Security
///
/// This function rejects:
/// - `..` components anywhere in the name
/// - Absolute names and Windows drive prefixes
/// - Names containing null bytes
/// - Names that resolve to the staging directory itself
pub fn staged_path(staging_dir: &Path, member: &str) -> Result<PathBuf> {
    if member.contains('\0') {
        bail!("Member name contains null bytes");
    }

    let relative = Path::new(member);
    let mut resolved = staging_dir.to_path_buf();
    let mut depth = 0usize;

    for component in relative.components() {
        match component {
            Component::Normal(name) => {
                resolved.push(name);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                bail!("Path traversal attempt detected: {} contains '..'", member);
            }
            Component::RootDir | Component::Prefix(_) => {
                bail!("Absolute member name not allowed: {}", member);
            }
        }
    }

    if depth == 0 {
        return Err(anyhow!("Member name is empty: {:?}", member));
    }

    if !resolved.starts_with(staging_dir) {
        bail!("Resolved path escapes staging directory: {}", resolved.display());
    }

    Ok(resolved)
}

/// Validates that the input root of a run exists.
pub fn validate_input_path(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        bail!("Input path does not exist: {}", path.display());
    }
    path.canonicalize()
        .with_context(|| format!("Failed to canonicalize input path {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_member_name() {
        assert_eq!(normalize_member_name("./private/var/db"), "private/var/db");
        assert_eq!(normalize_member_name("/private/var/db"), "private/var/db");
        assert_eq!(normalize_member_name(".//./a/b"), "a/b");
        assert_eq!(normalize_member_name("a\\b\\c.db"), "a/b/c.db");
        assert_eq!(normalize_member_name("../escape"), "../escape");
    }

    #[test]
    fn test_staged_path_traversal() {
        let base = Path::new("/tmp/staging");

        assert!(staged_path(base, "../etc/passwd").is_err());
        assert!(staged_path(base, "./../../etc/passwd").is_err());
        assert!(staged_path(base, "subdir/../../../etc/passwd").is_err());
        assert!(staged_path(base, "a/b/..").is_err());
    }

    #[test]
    fn test_staged_path_absolute() {
        let base = Path::new("/tmp/staging");
        assert!(staged_path(base, "/etc/passwd").is_err());
    }

    #[test]
    fn test_staged_path_null_and_empty() {
        let base = Path::new("/tmp/staging");
        assert!(staged_path(base, "file\0name").is_err());
        assert!(staged_path(base, "").is_err());
        assert!(staged_path(base, "./").is_err());
    }

    #[test]
    fn test_staged_path_valid() {
        let base = Path::new("/tmp/staging");

        assert_eq!(
            staged_path(base, "Library/foo.plist").unwrap(),
            PathBuf::from("/tmp/staging/Library/foo.plist")
        );
        assert_eq!(
            staged_path(base, "./private/var/mobile/sms.db").unwrap(),
            PathBuf::from("/tmp/staging/private/var/mobile/sms.db")
        );
    }

    #[test]
    fn test_validate_input_path() {
        let temp_dir = TempDir::new().unwrap();
        assert!(validate_input_path(temp_dir.path()).is_ok());
        assert!(validate_input_path(&temp_dir.path().join("missing")).is_err());
    }
}

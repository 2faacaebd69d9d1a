//! Mtime-based freshness detection.
//!
//! Cheaper than content hashing but fooled by tools that rewrite files
//! without changing them (and by coarse filesystem timestamps).

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Get the modification time of a file
///
/// Returns `None` if the file doesn't exist or mtime cannot be read
pub fn get_mtime(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|m| m.modified()).ok()
}

/// Newest modification time among `files`.
pub fn newest_mtime(files: &[PathBuf]) -> Option<SystemTime> {
    files.iter().filter_map(|p| get_mtime(p)).max()
}

/// Check if any of `files` changed after `since`.
///
/// A missing `since` means nothing was ever built, so everything is newer.
pub fn any_newer_than(files: &[PathBuf], since: Option<SystemTime>) -> bool {
    let Some(since) = since else {
        return true;
    };
    newest_mtime(files).is_some_and(|newest| newest > since)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_newest_mtime() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.rs");
        let b = dir.path().join("b.rs");
        fs::write(&a, "a").unwrap();
        fs::write(&b, "b").unwrap();

        let newest = newest_mtime(&[a.clone(), b.clone()]).unwrap();
        assert!(newest >= get_mtime(&a).unwrap());
        assert!(newest >= get_mtime(&b).unwrap());
        assert!(newest_mtime(&[dir.path().join("missing")]).is_none());
    }

    #[test]
    fn test_any_newer_than() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.rs");
        fs::write(&a, "a").unwrap();
        let mtime = get_mtime(&a).unwrap();

        assert!(any_newer_than(&[a.clone()], None));
        assert!(any_newer_than(&[a.clone()], Some(mtime - Duration::from_secs(60))));
        assert!(!any_newer_than(&[a.clone()], Some(mtime)));
        assert!(!any_newer_than(&[a], Some(mtime + Duration::from_secs(60))));
    }
}

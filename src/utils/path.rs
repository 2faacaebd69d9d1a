//! Path normalization utilities.

use std::path::{Component, Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Existing paths are canonicalized (symlinks, `.`, `..` resolved). For paths
/// that don't exist yet (an output directory before the first build), the
/// nearest existing ancestor is canonicalized and the remaining components
/// are appended, so `normalize_path(root.join("dist"))` always starts with
/// `normalize_path(root)`.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };
    let absolute = lexical_clean(&absolute);

    let mut existing = absolute.as_path();
    let mut rest = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return absolute,
        }
    }

    let mut result = existing
        .canonicalize()
        .unwrap_or_else(|_| existing.to_path_buf());
    for name in rest.iter().rev() {
        result.push(name);
    }
    result
}

/// Resolve `.` and `..` components without touching the file system.
fn lexical_clean(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}

/// Check if path is a temp/backup file (editor artifacts)
pub fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with(".#")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_existing() {
        let dir = TempDir::new().unwrap();
        let normalized = normalize_path(&dir.path().join("."));
        assert_eq!(normalized, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn test_normalize_missing_keeps_canonical_prefix() {
        let dir = TempDir::new().unwrap();
        let root = normalize_path(dir.path());
        let missing = normalize_path(&dir.path().join("dist/./assets/../pkg"));
        assert!(missing.starts_with(&root));
        assert_eq!(missing, root.join("dist/pkg"));
    }

    #[test]
    fn test_lexical_clean() {
        assert_eq!(
            lexical_clean(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
    }

    #[test]
    fn test_is_temp_file() {
        assert!(is_temp_file(Path::new("src/lib.rs~")));
        assert!(is_temp_file(Path::new("src/.lib.rs.swp")));
        assert!(is_temp_file(Path::new("src/.#lib.rs")));
        assert!(!is_temp_file(Path::new("src/lib.rs")));
    }
}

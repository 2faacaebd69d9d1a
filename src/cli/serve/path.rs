//! URL to filesystem path resolution.

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Resolve a request URL to a file under `serve_root`.
///
/// Directories resolve to their `index.html`. `None` for missing files and
/// for anything that would escape `serve_root` (`..` segments, encoded or
/// not, and symlinks pointing outside).
pub fn resolve_path(url: &str, serve_root: &Path) -> Option<PathBuf> {
    let clean = normalize_url(url)?;

    let local = serve_root.join(&clean);
    let canonical = local.canonicalize().ok()?;
    let root_canonical = serve_root.canonicalize().ok()?;
    if !canonical.starts_with(&root_canonical) {
        return None;
    }

    if canonical.is_file() {
        return Some(canonical);
    }
    if canonical.is_dir() {
        let index = canonical.join("index.html");
        if index.is_file() {
            return Some(index);
        }
    }
    None
}

/// Request path without query or fragment, before decoding.
pub fn url_path(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

/// Decode and validate: no `..`, backslash, or NUL segments.
fn normalize_url(url: &str) -> Option<String> {
    let decoded = percent_decode_str(url_path(url)).decode_utf8().ok()?;

    let mut segments = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            s if s.contains(['\\', '\0']) => return None,
            s => segments.push(s),
        }
    }
    Some(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn site() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("dist/img")).unwrap();
        fs::write(dir.path().join("dist/index.html"), "<html></html>").unwrap();
        fs::write(dir.path().join("dist/app_bg.wasm"), b"\0asm").unwrap();
        fs::write(dir.path().join("dist/img/my logo.svg"), "<svg/>").unwrap();
        fs::write(dir.path().join("secret.txt"), "no").unwrap();
        dir
    }

    #[test]
    fn test_directory_resolves_to_index() {
        let dir = site();
        let root = dir.path().join("dist");
        let index = resolve_path("/", &root).unwrap();
        assert!(index.ends_with("index.html"));
        assert_eq!(resolve_path("/?v=2", &root), Some(index));
    }

    #[test]
    fn test_percent_encoded_names() {
        let dir = site();
        let root = dir.path().join("dist");
        assert!(resolve_path("/img/my%20logo.svg", &root).is_some());
        assert!(resolve_path("/app_bg.wasm", &root).is_some());
    }

    #[test]
    fn test_traversal_rejected() {
        let dir = site();
        let root = dir.path().join("dist");
        assert!(resolve_path("/../secret.txt", &root).is_none());
        assert!(resolve_path("/%2e%2e/secret.txt", &root).is_none());
        assert!(resolve_path("/img/..%2f..%2fsecret.txt", &root).is_none());
        assert!(resolve_path("/img/..\\..\\secret.txt", &root).is_none());
    }

    #[test]
    fn test_missing_file() {
        let dir = site();
        assert!(resolve_path("/nope.js", &dir.path().join("dist")).is_none());
    }

    #[test]
    fn test_url_path_strips_query_and_fragment() {
        assert_eq!(url_path("/__wasp/hotreload.js?t=1"), "/__wasp/hotreload.js");
        assert_eq!(url_path("/a#b"), "/a");
    }
}

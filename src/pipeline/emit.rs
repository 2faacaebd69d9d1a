//! Output assembly.
//!
//! The next output tree is assembled in a staging directory next to the
//! output directory and swapped in with two renames:
//!
//! ```text
//! dist/               → .dist.wasp-old/   (previous output)
//! .dist.wasp-staging/ → dist/             (new output)
//! .dist.wasp-old/     → removed
//! ```
//!
//! Until the swap, the previous output is untouched; a failure removes the
//! staging directory and leaves `dist/` exactly as it was.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::core::{BuildTarget, RenderedDocument};
use crate::freshness::{ContentHash, compute_bytes_hash};
use crate::pipeline::BuildError;

/// Length of the hash embedded in hashed file names.
const HASH_LEN: usize = 8;

/// One artifact ready to be written to the output directory.
#[derive(Debug, Clone)]
pub struct OutputFile {
    pub name: String,
    pub contents: Vec<u8>,
}

impl OutputFile {
    pub fn hash(&self) -> ContentHash {
        compute_bytes_hash(&self.contents)
    }
}

/// `app_bg.wasm` + hash → `app_bg.1a2b3c4d.wasm`.
pub fn hashed_name(name: &str, hash: ContentHash) -> String {
    let short = hash.short(HASH_LEN);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}.{short}.{ext}"),
        _ => format!("{name}.{short}"),
    }
}

fn is_script(name: &str) -> bool {
    name.ends_with(".js") || name.ends_with(".mjs")
}

/// Give every artifact a content-hashed name.
///
/// Scripts refer to other artifacts by name (the bindgen glue loads
/// `app_bg.wasm` relative to itself), so non-script artifacts are renamed
/// first and scripts are rewritten to the new names before being hashed.
pub fn apply_hashed_names(files: Vec<OutputFile>) -> Vec<OutputFile> {
    let renames: Vec<(String, String)> = files
        .iter()
        .filter(|f| !is_script(&f.name))
        .map(|f| (f.name.clone(), hashed_name(&f.name, f.hash())))
        .collect();

    files
        .into_iter()
        .map(|file| {
            if !is_script(&file.name) {
                let name = hashed_name(&file.name, file.hash());
                return OutputFile { name, ..file };
            }
            let contents = match String::from_utf8(file.contents) {
                Ok(mut text) => {
                    for (from, to) in &renames {
                        text = replace_file_name(&text, from, to);
                    }
                    text.into_bytes()
                }
                Err(e) => e.into_bytes(),
            };
            let name = hashed_name(&file.name, compute_bytes_hash(&contents));
            OutputFile { name, contents }
        })
        .collect()
}

/// Replace whole-name occurrences of `from`: `a.wasm` must not match inside
/// `ba.wasm` or `a.wasm.map`.
fn replace_file_name(text: &str, from: &str, to: &str) -> String {
    let is_name_char = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.');

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(from) {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + from.len()..];

        let starts_name = out.chars().next_back().is_none_or(|c| !is_name_char(c));
        let ends_name = rest.chars().next().is_none_or(|c| !is_name_char(c));
        out.push_str(if starts_name && ends_name { to } else { from });
    }
    out.push_str(rest);
    out
}

/// Everything that makes up one output tree.
pub struct OutputTree<'a> {
    /// Static files with their path relative to the static directory.
    pub static_files: Vec<(PathBuf, PathBuf)>,
    pub artifacts: &'a [OutputFile],
    pub document: &'a RenderedDocument,
}

/// Assemble `tree` in the staging directory and swap it into place.
pub fn emit(target: &BuildTarget, tree: &OutputTree<'_>) -> Result<(), BuildError> {
    let staging = target.staging_dir();
    let result = assemble(&staging, target.output_dir(), tree).and_then(|()| swap(target));
    if result.is_err() {
        let _ = remove_dir_if_exists(&staging);
    }
    result
}

fn assemble(staging: &Path, output_dir: &Path, tree: &OutputTree<'_>) -> Result<(), BuildError> {
    remove_dir_if_exists(staging).map_err(|e| BuildError::emit(staging, e))?;
    fs::create_dir_all(staging).map_err(|e| BuildError::emit(staging, e))?;

    for (rel, source) in &tree.static_files {
        let dest = staging.join(rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::emit(parent, e))?;
        }
        fs::copy(source, &dest).map_err(|e| BuildError::emit(&dest, e))?;
    }

    for file in tree.artifacts {
        let dest = staging.join(&file.name);
        fs::write(&dest, &file.contents).map_err(|e| BuildError::emit(&dest, e))?;
    }

    let doc_rel = tree
        .document
        .file_path
        .strip_prefix(output_dir)
        .unwrap_or(&tree.document.file_path);
    let dest = staging.join(doc_rel);
    fs::write(&dest, &tree.document.contents).map_err(|e| BuildError::emit(&dest, e))
}

fn swap(target: &BuildTarget) -> Result<(), BuildError> {
    let output = target.output_dir();
    let staging = target.staging_dir();
    let retired = target.retired_dir();

    remove_dir_if_exists(&retired).map_err(|e| BuildError::emit(&retired, e))?;

    let had_output = output.exists();
    if had_output {
        fs::rename(output, &retired).map_err(|e| BuildError::emit(output, e))?;
    } else if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::emit(parent, e))?;
    }

    if let Err(e) = fs::rename(&staging, output) {
        if had_output {
            restore(&retired, output);
        }
        return Err(BuildError::emit(output, e));
    }

    if had_output && let Err(e) = fs::remove_dir_all(&retired) {
        crate::debug!("emit"; "failed to remove {}: {}", retired.display(), e);
    }
    Ok(())
}

/// Move the previous output back after a failed swap.
fn restore(retired: &Path, output: &Path) -> bool {
    match fs::rename(retired, output) {
        Ok(()) => true,
        Err(e) => {
            crate::log!("emit";
                "failed to restore {}: {}; previous output is kept in {}",
                output.display(), e, retired.display());
            false
        }
    }
}

pub fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file(name: &str, contents: &str) -> OutputFile {
        OutputFile {
            name: name.into(),
            contents: contents.as_bytes().to_vec(),
        }
    }

    fn target(root: &Path) -> BuildTarget {
        BuildTarget::new(
            root.join("crate"),
            root.join("dist"),
            root.join("crate/Cargo.toml"),
            root.join("index.html"),
        )
        .unwrap()
    }

    fn document(target: &BuildTarget, contents: &str) -> RenderedDocument {
        RenderedDocument {
            file_path: target.output_dir().join("index.html"),
            referenced_artifacts: vec![],
            contents: contents.into(),
        }
    }

    #[test]
    fn test_hashed_name() {
        let hash = ContentHash::new([0xab; 32]);
        assert_eq!(hashed_name("app_bg.wasm", hash), "app_bg.abababab.wasm");
        assert_eq!(hashed_name("LICENSE", hash), "LICENSE.abababab");
        assert_eq!(hashed_name(".env", hash), ".env.abababab");
    }

    #[test]
    fn test_hashed_names_rewrite_scripts() {
        let files = apply_hashed_names(vec![
            file("app_bg.wasm", "\0asm"),
            file("app.js", "new URL('app_bg.wasm', import.meta.url)"),
        ]);

        let wasm_name = hashed_name("app_bg.wasm", compute_bytes_hash(b"\0asm"));
        assert_eq!(files[0].name, wasm_name);

        let js = String::from_utf8(files[1].contents.clone()).unwrap();
        assert_eq!(js, format!("new URL('{wasm_name}', import.meta.url)"));
        assert_eq!(files[1].name, hashed_name("app.js", compute_bytes_hash(js.as_bytes())));
    }

    #[test]
    fn test_hashed_names_match_whole_file_names() {
        let files = apply_hashed_names(vec![
            file("a.wasm", "\0asm a"),
            file("ba.wasm", "\0asm ba"),
            file("app.js", r#"fetch("a.wasm"); fetch("./ba.wasm"); fetch("a.wasm.map");"#),
        ]);

        let a = hashed_name("a.wasm", compute_bytes_hash(b"\0asm a"));
        let ba = hashed_name("ba.wasm", compute_bytes_hash(b"\0asm ba"));
        let js = String::from_utf8(files[2].contents.clone()).unwrap();
        assert_eq!(
            js,
            format!(r#"fetch("{a}"); fetch("./{ba}"); fetch("a.wasm.map");"#)
        );
    }

    #[test]
    fn test_replace_file_name_boundaries() {
        assert_eq!(replace_file_name("a.wasm", "a.wasm", "x"), "x");
        assert_eq!(replace_file_name("'a.wasm'", "a.wasm", "x"), "'x'");
        assert_eq!(replace_file_name("pkg/a.wasm", "a.wasm", "x"), "pkg/x");
        assert_eq!(replace_file_name("ba.wasm a.wasm", "a.wasm", "x"), "ba.wasm x");
        assert_eq!(replace_file_name("my_a.wasm", "a.wasm", "x"), "my_a.wasm");
    }

    #[test]
    fn test_restore_reports_missing_previous_output() {
        let dir = TempDir::new().unwrap();
        let retired = dir.path().join(".dist.wasp-old");
        let output = dir.path().join("dist");

        assert!(!restore(&retired, &output));

        fs::create_dir_all(&retired).unwrap();
        fs::write(retired.join("index.html"), "previous").unwrap();
        assert!(restore(&retired, &output));
        assert_eq!(fs::read_to_string(output.join("index.html")).unwrap(), "previous");
        assert!(!retired.exists());
    }

    #[test]
    fn test_emit_replaces_previous_tree() {
        let dir = TempDir::new().unwrap();
        let target = target(dir.path());
        fs::create_dir_all(target.output_dir()).unwrap();
        fs::write(target.output_dir().join("stale.txt"), "old").unwrap();

        let static_src = dir.path().join("favicon.ico");
        fs::write(&static_src, "icon").unwrap();
        let artifacts = [file("app.js", "js")];
        let doc = document(&target, "<html></html>");

        emit(
            &target,
            &OutputTree {
                static_files: vec![(PathBuf::from("img/favicon.ico"), static_src)],
                artifacts: &artifacts,
                document: &doc,
            },
        )
        .unwrap();

        let out = target.output_dir();
        assert!(!out.join("stale.txt").exists());
        assert_eq!(fs::read_to_string(out.join("app.js")).unwrap(), "js");
        assert_eq!(fs::read_to_string(out.join("img/favicon.ico")).unwrap(), "icon");
        assert_eq!(fs::read_to_string(out.join("index.html")).unwrap(), "<html></html>");
        assert!(!target.staging_dir().exists());
        assert!(!target.retired_dir().exists());
    }

    #[test]
    fn test_emit_failure_leaves_output_untouched() {
        let dir = TempDir::new().unwrap();
        let target = target(dir.path());
        fs::create_dir_all(target.output_dir()).unwrap();
        fs::write(target.output_dir().join("index.html"), "previous").unwrap();

        let doc = document(&target, "next");
        let err = emit(
            &target,
            &OutputTree {
                static_files: vec![(PathBuf::from("a.txt"), dir.path().join("missing.txt"))],
                artifacts: &[],
                document: &doc,
            },
        )
        .unwrap_err();

        assert!(matches!(err, BuildError::Emit { .. }));
        assert_eq!(
            fs::read_to_string(target.output_dir().join("index.html")).unwrap(),
            "previous"
        );
        assert!(!target.staging_dir().exists());
    }
}

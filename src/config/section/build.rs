//! `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! source = "."                    # Crate directory compiled to WebAssembly
//! entry = "Cargo.toml"            # Entry file handed to the compiler (relative to source)
//! output = "dist"                 # Output directory
//! template = "public/index.html"  # HTML template receiving artifact references
//! static_dir = "public"           # Copied verbatim into the output directory
//! cache_dir = ".wasp"             # Build record and compiler staging area
//! public_url = "./"               # Prefix for injected artifact URLs
//! hash_filenames = false          # app.1a2b3c4d.wasm style names
//! auto_init = true                # Call the glue module's default export
//! freshness = "hash"              # "hash" (blake3 content) or "mtime"
//! ignore = ["target", "node_modules", "pkg"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::error::ConfigDiagnostics;

/// Staleness policy for the source crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    /// Compare blake3 content hashes of all source files.
    #[default]
    Hash,
    /// Compare the newest source mtime against the last artifact timestamp.
    Mtime,
}

/// Build paths and output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSectionConfig {
    pub source: PathBuf,
    pub entry: PathBuf,
    pub output: PathBuf,
    pub template: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub cache_dir: PathBuf,
    pub public_url: String,
    pub hash_filenames: bool,
    pub auto_init: bool,
    pub freshness: Freshness,
    /// Directory or file names skipped when hashing and watching the source.
    pub ignore: Vec<String>,

    /// Remove output and cache before building (CLI only)
    #[serde(skip)]
    pub clean: bool,
}

impl Default for BuildSectionConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("."),
            entry: PathBuf::from("Cargo.toml"),
            output: PathBuf::from("dist"),
            template: PathBuf::from("public/index.html"),
            static_dir: Some(PathBuf::from("public")),
            cache_dir: PathBuf::from(".wasp"),
            public_url: "./".into(),
            hash_filenames: false,
            auto_init: true,
            freshness: Freshness::Hash,
            ignore: vec!["target".into(), "node_modules".into(), "pkg".into()],
            clean: false,
        }
    }
}

impl BuildSectionConfig {
    /// Absolute entry file (entry is relative to the source directory).
    pub fn entry_file(&self) -> PathBuf {
        self.source.join(&self.entry)
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.source == self.output {
            diag.error_with_hint(
                "build.output",
                "output directory must differ from the source directory",
                "use a dedicated directory such as `dist`",
            );
        } else if self.source.starts_with(&self.output) {
            diag.error(
                "build.output",
                format!(
                    "output directory `{}` contains the source directory",
                    self.output.display()
                ),
            );
        }

        if self.static_dir.as_ref() == Some(&self.source) {
            diag.error_with_hint(
                "build.static_dir",
                "static directory must differ from the source directory",
                "point it at an asset folder such as `public`, or at a parent of the crate",
            );
        }

        if !self.source.is_dir() {
            diag.error(
                "build.source",
                format!("source directory `{}` not found", self.source.display()),
            );
        } else if !self.entry_file().exists() {
            diag.error(
                "build.entry",
                format!("entry file `{}` not found", self.entry_file().display()),
            );
        }

        if !self.template.is_file() {
            diag.error_with_hint(
                "build.template",
                format!("template `{}` not found", self.template.display()),
                "create an HTML file containing `<!-- wasp:inject -->`",
            );
        }

        if self.cache_dir == self.output || self.cache_dir.starts_with(&self.output) {
            diag.error(
                "build.cache_dir",
                "cache directory must not live inside the output directory",
            );
        }

        if self.public_url.contains(char::is_whitespace) {
            diag.error("build.public_url", "must not contain whitespace");
        }
    }

    /// Normalize all paths relative to the project root.
    pub fn normalize(&mut self, root: &Path) {
        use crate::utils::path::normalize_path;

        self.source = normalize_path(&root.join(expand(&self.source)));
        self.output = normalize_path(&root.join(expand(&self.output)));
        self.template = normalize_path(&root.join(expand(&self.template)));
        self.cache_dir = normalize_path(&root.join(expand(&self.cache_dir)));
        self.static_dir = self
            .static_dir
            .take()
            .map(|dir| normalize_path(&root.join(expand(&dir))));
    }
}

/// Expand a leading `~` in a configured path.
fn expand(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}

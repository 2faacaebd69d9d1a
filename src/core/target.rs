//! Build data model: what is built, what compilation produced, what the
//! renderer emitted, and what the watcher observed.

use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::WaspConfig;
use crate::freshness::ContentHash;

/// Name of the build record inside the cache directory.
const RECORD_FILE: &str = "build.json";

/// Compiler staging directory inside the cache directory.
const COMPILE_DIR: &str = "out";

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("{field} must be an absolute path: {}", path.display())]
    NotAbsolute { field: &'static str, path: PathBuf },

    #[error("source and output directory are the same: {}", .0.display())]
    SameDirectory(PathBuf),

    #[error("output directory {} contains the source directory {}", output_dir.display(), source_dir.display())]
    OutputContainsSource {
        output_dir: PathBuf,
        source_dir: PathBuf,
    },
}

/// Paths of one build, resolved once at startup and never mutated.
///
/// `source_dir` and `output_dir` are distinct absolute paths and the output
/// directory never contains the source directory. The reverse is allowed:
/// a `dist/` inside the crate directory is excluded from input scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    source_dir: PathBuf,
    output_dir: PathBuf,
    entry_file: PathBuf,
    template: PathBuf,
    static_dir: Option<PathBuf>,
    cache_dir: PathBuf,
}

impl BuildTarget {
    /// Target with the cache under the source directory and no static files.
    #[cfg(test)]
    pub fn new(
        source_dir: PathBuf,
        output_dir: PathBuf,
        entry_file: PathBuf,
        template: PathBuf,
    ) -> Result<Self, TargetError> {
        let cache_dir = source_dir.join(".wasp");
        Self::with_dirs(source_dir, output_dir, entry_file, template, None, cache_dir)
    }

    pub fn from_config(config: &WaspConfig) -> Result<Self, TargetError> {
        let build = &config.build;
        Self::with_dirs(
            build.source.clone(),
            build.output.clone(),
            build.entry_file(),
            build.template.clone(),
            build.static_dir.clone(),
            build.cache_dir.clone(),
        )
    }

    fn with_dirs(
        source_dir: PathBuf,
        output_dir: PathBuf,
        entry_file: PathBuf,
        template: PathBuf,
        static_dir: Option<PathBuf>,
        cache_dir: PathBuf,
    ) -> Result<Self, TargetError> {
        for (field, path) in [
            ("source directory", &source_dir),
            ("output directory", &output_dir),
            ("entry file", &entry_file),
            ("template", &template),
            ("cache directory", &cache_dir),
        ] {
            if !path.is_absolute() {
                return Err(TargetError::NotAbsolute {
                    field,
                    path: path.clone(),
                });
            }
        }

        if source_dir == output_dir {
            return Err(TargetError::SameDirectory(output_dir));
        }
        if source_dir.starts_with(&output_dir) {
            return Err(TargetError::OutputContainsSource {
                output_dir,
                source_dir,
            });
        }

        Ok(Self {
            source_dir,
            output_dir,
            entry_file,
            template,
            static_dir,
            cache_dir,
        })
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn entry_file(&self) -> &Path {
        &self.entry_file
    }

    pub fn template(&self) -> &Path {
        &self.template
    }

    pub fn static_dir(&self) -> Option<&Path> {
        self.static_dir.as_deref()
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Directory the crate lives in (handed to the compiler).
    pub fn crate_dir(&self) -> &Path {
        self.entry_file.parent().unwrap_or(&self.source_dir)
    }

    /// Persisted record of the last successful build.
    pub fn record_path(&self) -> PathBuf {
        self.cache_dir.join(RECORD_FILE)
    }

    /// Fresh directory each compiler invocation writes into.
    pub fn compile_dir(&self) -> PathBuf {
        self.cache_dir.join(COMPILE_DIR)
    }

    /// Sibling of the output directory where the next tree is assembled.
    pub fn staging_dir(&self) -> PathBuf {
        self.output_sibling("wasp-staging")
    }

    /// Sibling the previous output is moved to during the swap.
    pub fn retired_dir(&self) -> PathBuf {
        self.output_sibling("wasp-old")
    }

    fn output_sibling(&self, suffix: &str) -> PathBuf {
        let name = self
            .output_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".into());
        let parent = self.output_dir.parent().unwrap_or(&self.output_dir);
        parent.join(format!(".{name}.{suffix}"))
    }
}

/// A file produced by the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    pub file_path: PathBuf,
    pub content_hash: ContentHash,
    pub produced_at: SystemTime,
}

impl CompiledArtifact {
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn extension(&self) -> Option<&str> {
        self.file_path.extension().and_then(|e| e.to_str())
    }
}

/// The template with artifact references injected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub file_path: PathBuf,
    /// Artifacts in injection order.
    pub referenced_artifacts: Vec<PathBuf>,
    pub contents: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// A single file system change seen by the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub changed_path: PathBuf,
    pub kind: ChangeKind,
    pub timestamp: Instant,
}

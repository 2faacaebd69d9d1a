//! Persisted record of the last successful build.
//!
//! Stored as JSON in the cache directory. A missing or unreadable record
//! simply means "never built": every stage runs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::core::CompiledArtifact;
use crate::freshness::{ContentHash, compute_file_hash};
use crate::graph::InputKind;

/// Bumped when the record layout changes; older records are discarded.
const RECORD_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub version: u32,
    /// Fingerprint per input kind, keyed by [`InputKind::name`].
    pub inputs: FxHashMap<String, ContentHash>,
    /// When the current artifacts' compilation started.
    pub compiled_at: SystemTime,
    /// Artifacts as emitted into the output directory, in injection order.
    pub artifacts: Vec<CompiledArtifact>,
    pub document: PathBuf,
    pub document_hash: ContentHash,
}

impl BuildRecord {
    pub fn new(
        inputs: &[(InputKind, ContentHash)],
        compiled_at: SystemTime,
        artifacts: Vec<CompiledArtifact>,
        document: PathBuf,
        document_hash: ContentHash,
    ) -> Self {
        Self {
            version: RECORD_VERSION,
            inputs: inputs
                .iter()
                .map(|(kind, hash)| (kind.name().to_string(), *hash))
                .collect(),
            compiled_at,
            artifacts,
            document,
            document_hash,
        }
    }

    /// Load the record, `None` if absent, corrupt or from another version.
    pub fn load(path: &Path) -> Option<Self> {
        let json = fs::read_to_string(path).ok()?;
        match serde_json::from_str::<Self>(&json) {
            Ok(record) if record.version == RECORD_VERSION => Some(record),
            Ok(_) => {
                crate::debug!("record"; "discarding record from another version");
                None
            }
            Err(e) => {
                crate::debug!("record"; "discarding unreadable record: {}", e);
                None
            }
        }
    }

    /// Write the record (temp file + rename, so readers never see half a file).
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)
    }

    pub fn input(&self, kind: InputKind) -> Option<ContentHash> {
        self.inputs.get(kind.name()).copied()
    }

    /// Whether every recorded artifact is still in the output directory
    /// with the recorded contents.
    pub fn artifacts_intact(&self) -> bool {
        self.artifacts
            .iter()
            .all(|a| compute_file_hash(&a.file_path) == a.content_hash)
    }

    pub fn document_intact(&self) -> bool {
        compute_file_hash(&self.document) == self.document_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::freshness::compute_bytes_hash;
    use tempfile::TempDir;

    fn sample(dir: &Path) -> BuildRecord {
        let wasm = dir.join("app_bg.wasm");
        fs::write(&wasm, b"\0asm").unwrap();
        let doc = dir.join("index.html");
        fs::write(&doc, "<html></html>").unwrap();

        BuildRecord::new(
            &[(InputKind::Source, ContentHash::new([1; 32]))],
            SystemTime::UNIX_EPOCH,
            vec![CompiledArtifact {
                file_path: wasm,
                content_hash: compute_bytes_hash(b"\0asm"),
                produced_at: SystemTime::UNIX_EPOCH,
            }],
            doc,
            compute_bytes_hash(b"<html></html>"),
        )
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".wasp/build.json");
        let record = sample(dir.path());

        record.save(&path).unwrap();
        let loaded = BuildRecord::load(&path).unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.input(InputKind::Source), Some(ContentHash::new([1; 32])));
        assert_eq!(loaded.input(InputKind::Static), None);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_load_missing_or_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("build.json");
        assert!(BuildRecord::load(&path).is_none());

        fs::write(&path, "{ not json").unwrap();
        assert!(BuildRecord::load(&path).is_none());

        let mut record = sample(dir.path());
        record.version = RECORD_VERSION + 1;
        record.save(&path).unwrap();
        assert!(BuildRecord::load(&path).is_none());
    }

    #[test]
    fn test_intact_checks() {
        let dir = TempDir::new().unwrap();
        let record = sample(dir.path());
        assert!(record.artifacts_intact());
        assert!(record.document_intact());

        fs::write(dir.path().join("app_bg.wasm"), b"tampered").unwrap();
        assert!(!record.artifacts_intact());

        fs::remove_file(dir.path().join("index.html")).unwrap();
        assert!(!record.document_intact());
    }
}

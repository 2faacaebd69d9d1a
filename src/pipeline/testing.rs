//! Test fixture: a small project compiled by a fake compiler.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::SystemTime;

use tempfile::TempDir;

use super::Pipeline;
use crate::compiler::{CompileError, ModuleCompiler};
use crate::core::CompiledArtifact;
use crate::freshness::compute_bytes_hash;

/// Compiler double writing fixed artifacts, optionally failing.
#[derive(Clone, Default)]
pub(crate) struct FakeCompiler {
    pub out_dir: PathBuf,
    pub calls: Arc<AtomicUsize>,
    pub fail: Arc<AtomicBool>,
    pub wasm: Arc<parking_lot::Mutex<Vec<u8>>>,
}

impl ModuleCompiler for FakeCompiler {
    fn compile(&self, _entry: &Path) -> Result<Vec<CompiledArtifact>, CompileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(CompileError::Failed {
                code: Some(1),
                stderr: "error: aborting due to previous error".into(),
            });
        }
        let _ = fs::remove_dir_all(&self.out_dir);
        fs::create_dir_all(&self.out_dir).unwrap();
        let files = [
            ("app_bg.wasm", self.wasm.lock().clone()),
            ("app.js", b"fetch(new URL('app_bg.wasm', import.meta.url))".to_vec()),
        ];
        Ok(files
            .into_iter()
            .map(|(name, bytes)| {
                let file_path = self.out_dir.join(name);
                fs::write(&file_path, &bytes).unwrap();
                CompiledArtifact {
                    file_path,
                    content_hash: compute_bytes_hash(&bytes),
                    produced_at: SystemTime::now(),
                }
            })
            .collect())
    }
}

pub(crate) struct Project {
    _dir: TempDir,
    pub compiler: FakeCompiler,
    pub pipeline: Arc<Pipeline>,
}

impl Project {
    pub fn root(&self) -> PathBuf {
        self.pipeline.config.root.clone()
    }

    pub fn dist(&self) -> PathBuf {
        self.pipeline.target().output_dir().to_path_buf()
    }

    pub fn calls(&self) -> usize {
        self.compiler.calls.load(Ordering::SeqCst)
    }
}

/// Default `[build]` layout of [`project`].
const BUILD_TOML: &str = "[build]\nsource = \"crate\"\nentry = \"entry\"\noutput = \"dist\"\n\
                          template = \"crate/www/index.html\"\nstatic_dir = \"crate/www\"\n";

/// `crate/` compiled into `dist/`, template and static files in `crate/www`.
pub(crate) fn project(extra_toml: &str) -> Project {
    project_with(BUILD_TOML, extra_toml)
}

/// Same files as [`project`] with a custom `[build]` section.
pub(crate) fn project_with(build_toml: &str, extra_toml: &str) -> Project {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("crate/src")).unwrap();
    fs::create_dir_all(root.join("crate/www/img")).unwrap();
    fs::write(root.join("crate/entry"), "[package]\nname = \"app\"").unwrap();
    fs::write(root.join("crate/src/lib.rs"), "pub fn start() {}").unwrap();
    fs::write(
        root.join("crate/www/index.html"),
        "<html><head>\n<!-- wasp:inject -->\n</head><body></body></html>",
    )
    .unwrap();
    fs::write(root.join("crate/www/img/logo.svg"), "<svg/>").unwrap();

    let toml = format!("{build_toml}{extra_toml}");
    let config = crate::config::test_config_at(root, &toml);
    let compiler = FakeCompiler {
        out_dir: config.build.cache_dir.join("out"),
        wasm: Arc::new(parking_lot::Mutex::new(b"\0asm\x01\0\0\0".to_vec())),
        ..Default::default()
    };
    let pipeline =
        Pipeline::with_compiler(Arc::new(config), Box::new(compiler.clone())).unwrap();
    let pipeline = Arc::new(pipeline);
    Project {
        _dir: dir,
        compiler,
        pipeline,
    }
}

/// Relative path → contents of every file under `dir`.
pub(crate) fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    crate::freshness::walk_files(dir, |_| false)
        .into_iter()
        .map(|p| (p.strip_prefix(dir).unwrap().to_path_buf(), fs::read(&p).unwrap()))
        .collect()
}

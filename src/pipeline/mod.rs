//! Pipeline orchestrator.
//!
//! One pass walks the asset graph in topological order:
//!
//! ```text
//! fingerprint inputs ─► compare with BuildRecord ─► stale stages
//!        │
//!        ▼
//!   [compile] ─► [render] ─► [emit: stage + swap] ─► save BuildRecord
//! ```
//!
//! Stages that are not stale reuse what the previous pass left in the
//! output directory. When nothing is stale the pass writes nothing.
//! The orchestrator is the only writer of the output directory.

mod emit;
mod error;
mod record;
#[cfg(test)]
pub(crate) mod testing;

pub use emit::OutputFile;
pub use error::BuildError;
pub use record::BuildRecord;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use serde::Serialize;

use crate::compiler::{CommandCompiler, ModuleCompiler};
use crate::config::{Freshness, WaspConfig};
use crate::core::{BuildTarget, CompiledArtifact, RenderedDocument, TargetError};
use crate::freshness::{ContentHash, compute_bytes_hash, mtime};
use crate::graph::{AssetGraph, InputKind, Stage};
use crate::log;
use crate::render::Renderer;
use emit::{OutputTree, apply_hashed_names, remove_dir_if_exists};

/// Result of a successful pass.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// Stages that ran; empty when everything was up to date.
    pub stages: Vec<Stage>,
    pub document: RenderedDocument,
}

impl BuildOutcome {
    pub fn is_up_to_date(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Settings that change the output without changing any input file.
#[derive(Serialize)]
struct OutputSettings<'a> {
    command: &'a [String],
    artifacts: &'a [String],
    out_name: &'a str,
    profile: &'a str,
    public_url: &'a str,
    auto_init: bool,
    hash_filenames: bool,
}

pub struct Pipeline {
    config: Arc<WaspConfig>,
    target: BuildTarget,
    graph: AssetGraph,
    compiler: Box<dyn ModuleCompiler>,
    renderer: Renderer,
    /// Serializes passes.
    running: Mutex<()>,
}

impl Pipeline {
    /// Pipeline with the configured external compiler.
    pub fn new(config: Arc<WaspConfig>) -> Result<Self, TargetError> {
        let target = BuildTarget::from_config(&config)?;
        let compiler = Box::new(CommandCompiler::new(&config, &target));
        Ok(Self::from_parts(config, target, compiler))
    }

    #[cfg(test)]
    pub fn with_compiler(
        config: Arc<WaspConfig>,
        compiler: Box<dyn ModuleCompiler>,
    ) -> Result<Self, TargetError> {
        let target = BuildTarget::from_config(&config)?;
        Ok(Self::from_parts(config, target, compiler))
    }

    fn from_parts(
        config: Arc<WaspConfig>,
        target: BuildTarget,
        compiler: Box<dyn ModuleCompiler>,
    ) -> Self {
        let graph = AssetGraph::new(&config, &target);
        let renderer = Renderer::new(&config);
        Self {
            config,
            target,
            graph,
            compiler,
            renderer,
            running: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &WaspConfig {
        &self.config
    }

    pub fn target(&self) -> &BuildTarget {
        &self.target
    }

    pub fn graph(&self) -> &AssetGraph {
        &self.graph
    }

    /// Remove output and cache directories (`--clean`).
    pub fn clean(&self) -> Result<(), BuildError> {
        let _guard = self.running.lock();
        for dir in [self.target.output_dir(), self.target.cache_dir()] {
            remove_dir_if_exists(dir).map_err(|e| BuildError::emit(dir, e))?;
        }
        log!("build"; "cleaned {}", self.config.root_relative(self.target.output_dir()).display());
        Ok(())
    }

    /// Run one orchestration pass.
    pub fn run(&self) -> Result<BuildOutcome, BuildError> {
        let _guard = self.running.lock();

        let inputs = self.fingerprint_inputs();
        let record = BuildRecord::load(&self.target.record_path());
        let changed = self.changed_inputs(&inputs, record.as_ref());
        let stages = self.graph.stale_stages(&changed);

        let previous = match record {
            Some(record) if stages.is_empty() => {
                crate::debug!("build"; "all inputs unchanged");
                return Ok(BuildOutcome {
                    stages,
                    document: self.recorded_document(&record)?,
                });
            }
            other => other,
        };

        crate::debug!(
            "build";
            "changed: [{}], running: [{}]",
            changed.iter().map(|k| k.name()).collect::<Vec<_>>().join(", "),
            stages.iter().map(|s| s.name()).collect::<Vec<_>>().join(", ")
        );

        // Without a record every input counts as changed, so a skipped stage
        // always has a previous result to reuse.
        let (files, compiled_at) = match (stages.contains(&Stage::Compile), &previous) {
            (false, Some(record)) => (self.reuse_artifacts(record)?, record.compiled_at),
            _ => self.compile()?,
        };

        let artifacts = self.emitted_artifacts(&files, compiled_at);
        let document = match (stages.contains(&Stage::Render), &previous) {
            (false, Some(record)) => self.recorded_document(record)?,
            _ => self.renderer.render(self.target.template(), &artifacts)?,
        };

        let static_files = self.static_files();
        emit::emit(
            &self.target,
            &OutputTree {
                static_files,
                artifacts: &files,
                document: &document,
            },
        )?;

        let record = BuildRecord::new(
            &inputs,
            compiled_at,
            artifacts,
            document.file_path.clone(),
            compute_bytes_hash(document.contents.as_bytes()),
        );
        let record_path = self.target.record_path();
        record
            .save(&record_path)
            .map_err(|source| BuildError::Record {
                path: record_path,
                source,
            })?;

        Ok(BuildOutcome { stages, document })
    }

    fn fingerprint_inputs(&self) -> Vec<(InputKind, ContentHash)> {
        InputKind::ALL
            .into_iter()
            .map(|kind| {
                let hash = match kind {
                    InputKind::Config => self.config_fingerprint(),
                    _ => self.graph.fingerprint(kind),
                };
                (kind, hash)
            })
            .collect()
    }

    /// Config file contents plus the effective settings (CLI overrides and
    /// the serve/build profile never show up in the file).
    fn config_fingerprint(&self) -> ContentHash {
        let build = &self.config.build;
        let compiler = &self.config.compiler;
        let settings = OutputSettings {
            command: &compiler.command,
            artifacts: &compiler.artifacts,
            out_name: &compiler.out_name,
            profile: compiler.profile.as_str(),
            public_url: &build.public_url,
            auto_init: build.auto_init,
            hash_filenames: build.hash_filenames,
        };

        let mut hasher = blake3::Hasher::new();
        hasher.update(self.graph.fingerprint(InputKind::Config).as_bytes());
        if let Ok(json) = serde_json::to_vec(&settings) {
            hasher.update(&json);
        }
        ContentHash::new(*hasher.finalize().as_bytes())
    }

    fn changed_inputs(
        &self,
        inputs: &[(InputKind, ContentHash)],
        record: Option<&BuildRecord>,
    ) -> Vec<InputKind> {
        let Some(record) = record else {
            return InputKind::ALL.to_vec();
        };

        let mut changed: Vec<InputKind> = inputs
            .iter()
            .filter(|(kind, hash)| match (kind, self.config.build.freshness) {
                (InputKind::Source, Freshness::Mtime) => mtime::any_newer_than(
                    &self.graph.input_files(InputKind::Source),
                    Some(record.compiled_at),
                ),
                _ => record.input(*kind) != Some(*hash),
            })
            .map(|(kind, _)| *kind)
            .collect();

        // Output edited or deleted behind our back.
        if !record.artifacts_intact() && !changed.contains(&InputKind::Source) {
            changed.push(InputKind::Source);
        }
        if !record.document_intact() && !changed.contains(&InputKind::Template) {
            changed.push(InputKind::Template);
        }
        changed
    }

    fn compile(&self) -> Result<(Vec<OutputFile>, SystemTime), BuildError> {
        log!("compile"; "compiling {}", self.config.root_relative(self.target.crate_dir()).display());
        let compiled = self.compiler.compile(self.target.entry_file())?;
        let compiled_at = compiled
            .iter()
            .map(|a| a.produced_at)
            .min()
            .unwrap_or_else(SystemTime::now);

        let files = compiled
            .iter()
            .map(|artifact| read_output_file(&artifact.file_path, artifact.file_name()))
            .collect::<Result<Vec<_>, _>>()?;

        let files = if self.config.build.hash_filenames {
            apply_hashed_names(files)
        } else {
            files
        };
        Ok((files, compiled_at))
    }

    /// Previous artifacts, read back from the output directory.
    fn reuse_artifacts(&self, record: &BuildRecord) -> Result<Vec<OutputFile>, BuildError> {
        record
            .artifacts
            .iter()
            .map(|artifact| read_output_file(&artifact.file_path, artifact.file_name()))
            .collect()
    }

    fn emitted_artifacts(&self, files: &[OutputFile], produced_at: SystemTime) -> Vec<CompiledArtifact> {
        files
            .iter()
            .map(|file| CompiledArtifact {
                file_path: self.target.output_dir().join(&file.name),
                content_hash: file.hash(),
                produced_at,
            })
            .collect()
    }

    fn recorded_document(&self, record: &BuildRecord) -> Result<RenderedDocument, BuildError> {
        let contents = fs::read_to_string(&record.document)
            .map_err(|e| BuildError::emit(&record.document, e))?;
        Ok(RenderedDocument {
            file_path: record.document.clone(),
            referenced_artifacts: record.artifacts.iter().map(|a| a.file_path.clone()).collect(),
            contents,
        })
    }

    fn static_files(&self) -> Vec<(PathBuf, PathBuf)> {
        let Some(static_dir) = self.target.static_dir() else {
            return Vec::new();
        };
        self.graph
            .input_files(InputKind::Static)
            .into_iter()
            .filter_map(|path| {
                let rel = path.strip_prefix(static_dir).ok()?.to_path_buf();
                Some((rel, path))
            })
            .collect()
    }
}

fn read_output_file(path: &Path, name: String) -> Result<OutputFile, BuildError> {
    let contents = fs::read(path).map_err(|e| BuildError::emit(path, e))?;
    Ok(OutputFile { name, contents })
}

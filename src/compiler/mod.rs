//! Module compiler adapter.
//!
//! Turns the source crate into WebAssembly artifacts by running an external
//! compiler. The pipeline only sees the [`ModuleCompiler`] trait, so tests
//! (and alternative toolchains) can stand in for `wasm-pack`.

mod command;

pub use command::CommandCompiler;

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::CompiledArtifact;

/// Compile the crate rooted at an entry file into artifacts.
pub trait ModuleCompiler: Send + Sync {
    /// Artifacts are returned in their configured order, which is also the
    /// order the renderer references them in.
    fn compile(&self, entry_file: &Path) -> Result<Vec<CompiledArtifact>, CompileError>;
}

#[derive(Debug, Error)]
pub enum CompileError {
    /// The compiler ran and exited unsuccessfully.
    #[error("compiler exited with {}\n{stderr}", exit_description(.code))]
    Failed { code: Option<i32>, stderr: String },

    /// The compiler reported success without producing an expected file.
    #[error("compiler succeeded but did not produce {}", .0.display())]
    MissingArtifact(PathBuf),

    /// The compiler was killed after exceeding its time limit.
    #[error("compiler timed out after {}s and was terminated", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("failed to run compiler `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to prepare compiler output directory {}", path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "a signal".to_string(),
    }
}

//! Build errors, tagged with the stage that failed.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::compiler::CompileError;
use crate::graph::Stage;
use crate::render::RenderError;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("compile failed: {0}")]
    Compile(#[from] CompileError),

    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    #[error("failed to write {}: {source}", path.display())]
    Emit {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to save build record {}: {source}", path.display())]
    Record {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BuildError {
    pub(crate) fn emit(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Emit {
            path: path.into(),
            source,
        }
    }

    /// The pipeline stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Compile(_) => Stage::Compile,
            Self::Render(_) => Stage::Render,
            Self::Emit { .. } | Self::Record { .. } => Stage::Emit,
        }
    }
}

//! Core types - pure abstractions shared across the codebase.

mod state;
mod target;

pub use state::{ServerState, StateCell, is_shutdown, register_server, setup_shutdown_handler};
pub use target::{BuildTarget, ChangeKind, CompiledArtifact, RenderedDocument, TargetError, WatchEvent};

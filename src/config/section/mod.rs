//! Configuration section definitions.

pub mod build;
pub mod compiler;
pub mod serve;

pub use build::{BuildSectionConfig, Freshness};
pub use compiler::{CompilerConfig, Profile};
pub use serve::ServeConfig;

//! `[compiler]` section configuration.
//!
//! Describes the external command that turns the source crate into
//! WebAssembly artifacts. Arguments may reference `$WASP_*` variables
//! (also exported to the subprocess environment):
//!
//! | Variable          | Value                                       |
//! |-------------------|---------------------------------------------|
//! | `WASP_ROOT`       | project root                                |
//! | `WASP_ENTRY`      | entry file (`build.entry` under the source) |
//! | `WASP_CRATE_DIR`  | directory containing the entry file         |
//! | `WASP_OUT_DIR`    | fresh staging directory for this invocation |
//! | `WASP_OUT_NAME`   | `compiler.out_name`                         |
//! | `WASP_PROFILE`    | `dev` for serve, `release` for build        |
//!
//! # Example
//!
//! ```toml
//! [compiler]
//! command = ["wasm-pack", "build", "$WASP_CRATE_DIR", "--target", "web",
//!            "--out-dir", "$WASP_OUT_DIR", "--out-name", "$WASP_OUT_NAME", "--$WASP_PROFILE"]
//! out_name = "app"
//! artifacts = ["${WASP_OUT_NAME}_bg.wasm", "${WASP_OUT_NAME}.js"]
//! timeout_secs = 600
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::error::ConfigDiagnostics;

/// Compilation profile passed to the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Dev,
    Release,
}

impl Profile {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Release => "release",
        }
    }
}

/// External compiler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Program and arguments.
    pub command: Vec<String>,

    /// Base name for emitted files.
    pub out_name: String,

    /// Expected artifacts, relative to the staging directory.
    /// Order is the injection order in the rendered document.
    pub artifacts: Vec<String>,

    /// Kill the compiler after this many seconds.
    pub timeout_secs: u64,

    /// Suppress compiler output on success.
    pub quiet: bool,

    /// Selected by the command being run (serve = dev, build = release).
    #[serde(skip)]
    pub profile: Profile,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            command: [
                "wasm-pack",
                "build",
                "$WASP_CRATE_DIR",
                "--target",
                "web",
                "--out-dir",
                "$WASP_OUT_DIR",
                "--out-name",
                "$WASP_OUT_NAME",
                "--$WASP_PROFILE",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            out_name: "app".into(),
            artifacts: vec![
                "${WASP_OUT_NAME}_bg.wasm".into(),
                "${WASP_OUT_NAME}.js".into(),
            ],
            timeout_secs: 600,
            quiet: false,
            profile: Profile::Dev,
        }
    }
}

impl CompilerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.command.is_empty() || self.command[0].trim().is_empty() {
            diag.error("compiler.command", "must name a program to run");
        }

        if self.artifacts.is_empty() {
            diag.error_with_hint(
                "compiler.artifacts",
                "at least one expected artifact is required",
                "wasm-pack emits `${WASP_OUT_NAME}_bg.wasm` and `${WASP_OUT_NAME}.js`",
            );
        }

        for artifact in &self.artifacts {
            if artifact.contains("..") || artifact.starts_with('/') {
                diag.error(
                    "compiler.artifacts",
                    format!("`{artifact}` must be relative to the staging directory"),
                );
            }
        }

        if self.out_name.is_empty() || self.out_name.contains(['/', '\\']) {
            diag.error("compiler.out_name", "must be a plain file name");
        }

        if self.timeout_secs == 0 {
            diag.error("compiler.timeout_secs", "must be greater than zero");
        }
    }
}

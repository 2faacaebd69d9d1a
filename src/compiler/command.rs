//! Subprocess-backed [`ModuleCompiler`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::compiler::{CompileError, ModuleCompiler};
use crate::config::{Profile, WaspConfig};
use crate::core::{BuildTarget, CompiledArtifact};
use crate::freshness::compute_file_hash;
use crate::log;
use crate::utils::exec::{Cmd, ExecError, FilterRule};

/// Progress noise printed by `wasm-pack` and `cargo` on success.
const COMPILER_FILTER: FilterRule = FilterRule::new(&[
    "[INFO]",
    "Compiling",
    "Finished",
    "Downloading",
    "Downloaded",
    "Updating",
    "Blocking",
    "Checking",
    "Installing",
    "Running",
    "Optimizing",
]);

/// Runs `compiler.command` with `$WASP_*` variables substituted.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    command: Vec<String>,
    artifacts: Vec<String>,
    out_name: String,
    profile: Profile,
    timeout: Duration,
    quiet: bool,
    root: PathBuf,
    staging: PathBuf,
}

impl CommandCompiler {
    pub fn new(config: &WaspConfig, target: &BuildTarget) -> Self {
        let compiler = &config.compiler;
        Self {
            command: compiler.command.clone(),
            artifacts: compiler.artifacts.clone(),
            out_name: compiler.out_name.clone(),
            profile: compiler.profile,
            timeout: compiler.timeout(),
            quiet: compiler.quiet,
            root: config.get_root().to_path_buf(),
            staging: target.compile_dir(),
        }
    }

    /// Override the configured time limit.
    #[cfg(test)]
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = limit;
        self
    }

    /// Variables substituted in arguments and exported to the subprocess.
    ///
    /// Sorted longest key first so `$WASP_OUT_NAME` is never clobbered by a
    /// shorter key sharing its prefix.
    fn vars(&self, entry_file: &Path) -> Vec<(&'static str, String)> {
        let crate_dir = entry_file.parent().unwrap_or(&self.root);
        let mut vars = vec![
            ("WASP_ROOT", self.root.display().to_string()),
            ("WASP_ENTRY", entry_file.display().to_string()),
            ("WASP_CRATE_DIR", crate_dir.display().to_string()),
            ("WASP_OUT_DIR", self.staging.display().to_string()),
            ("WASP_OUT_NAME", self.out_name.clone()),
            ("WASP_PROFILE", self.profile.as_str().to_string()),
        ];
        vars.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        vars
    }

    /// Remove whatever a previous (possibly failed) run left behind.
    fn reset_staging(&self) -> Result<(), CompileError> {
        let staging_err = |source| CompileError::Staging {
            path: self.staging.clone(),
            source,
        };
        match fs::remove_dir_all(&self.staging) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(staging_err(e)),
        }
        fs::create_dir_all(&self.staging).map_err(staging_err)
    }

    fn locate_program(&self, program: &str) -> Result<PathBuf, CompileError> {
        which::which_in(program, std::env::var_os("PATH"), &self.root).map_err(|e| {
            CompileError::Spawn {
                program: program.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, e),
            }
        })
    }

    fn collect_artifacts(
        &self,
        vars: &[(&'static str, String)],
        produced_at: SystemTime,
    ) -> Result<Vec<CompiledArtifact>, CompileError> {
        resolve_args(&self.artifacts, vars)
            .into_iter()
            .map(|name| {
                let file_path = self.staging.join(name);
                if !file_path.is_file() {
                    return Err(CompileError::MissingArtifact(file_path));
                }
                Ok(CompiledArtifact {
                    content_hash: compute_file_hash(&file_path),
                    file_path,
                    produced_at,
                })
            })
            .collect()
    }
}

impl ModuleCompiler for CommandCompiler {
    fn compile(&self, entry_file: &Path) -> Result<Vec<CompiledArtifact>, CompileError> {
        let vars = self.vars(entry_file);
        let resolved = resolve_args(&self.command, &vars);
        let Some((program, args)) = resolved.split_first() else {
            return Err(CompileError::Spawn {
                program: String::new(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "empty compiler command"),
            });
        };

        self.reset_staging()?;
        let program_path = self.locate_program(program)?;

        // Sources touched while the compiler runs must count as newer than
        // the result, so the timestamp is taken before starting.
        let started_at = SystemTime::now();
        crate::debug!("compile"; "{} {}", program, args.join(" "));

        let output = Cmd::new(&program_path)
            .args(args)
            .cwd(&self.root)
            .envs(vars.iter().map(|(k, v)| (*k, v.as_str())))
            .timeout(self.timeout)
            .run()
            .map_err(|err| match err {
                ExecError::Timeout { after, .. } => CompileError::Timeout(after),
                ExecError::Spawn { source, .. } | ExecError::Wait { source, .. } => {
                    CompileError::Spawn {
                        program: program.clone(),
                        source,
                    }
                }
            })?;

        if !output.success() {
            let mut stderr = COMPILER_FILTER.apply(&output.stderr).join("\n");
            if stderr.is_empty() {
                stderr = output.stdout.trim().to_string();
            }
            return Err(CompileError::Failed {
                code: output.status.code(),
                stderr,
            });
        }

        if !self.quiet {
            COMPILER_FILTER.log("compile", &output.stderr);
        }

        let artifacts = self.collect_artifacts(&vars, started_at)?;
        log!("compile"; "{} artifact(s) in {:.2}s", artifacts.len(), output.elapsed.as_secs_f32());
        Ok(artifacts)
    }
}

/// Resolve `$WASP_*` / `${WASP_*}` variables in command arguments.
pub fn resolve_args(args: &[String], vars: &[(&'static str, String)]) -> Vec<String> {
    args.iter()
        .map(|arg| {
            let mut result = arg.clone();
            for (key, value) in vars {
                result = result
                    .replace(&format!("${{{key}}}"), value)
                    .replace(&format!("${key}"), value);
            }
            result
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;

    fn vars() -> Vec<(&'static str, String)> {
        vec![
            ("WASP_OUT_NAME", "game".to_string()),
            ("WASP_OUT_DIR", "/tmp/out".to_string()),
        ]
    }

    #[test]
    fn test_resolve_args() {
        let args = vec![
            "--out-dir".to_string(),
            "$WASP_OUT_DIR".to_string(),
            "${WASP_OUT_NAME}_bg.wasm".to_string(),
            "--$WASP_UNKNOWN".to_string(),
        ];
        assert_eq!(
            resolve_args(&args, &vars()),
            vec!["--out-dir", "/tmp/out", "game_bg.wasm", "--$WASP_UNKNOWN"]
        );
    }

    #[test]
    fn test_vars_sorted_longest_first() {
        let dir = TempDir::new().unwrap();
        let config = crate::config::test_config_at(dir.path(), "");
        let target = BuildTarget::from_config(&config).unwrap();
        let compiler = CommandCompiler::new(&config, &target);

        let vars = compiler.vars(target.entry_file());
        assert!(vars.windows(2).all(|w| w[0].0.len() >= w[1].0.len()));
        let lookup = |k: &str| vars.iter().find(|(key, _)| *key == k).unwrap().1.clone();
        assert_eq!(lookup("WASP_OUT_DIR"), target.compile_dir().display().to_string());
        assert_eq!(lookup("WASP_CRATE_DIR"), config.root.display().to_string());
        assert_eq!(lookup("WASP_PROFILE"), "dev");
    }

    #[cfg(unix)]
    mod subprocess {
        use super::*;

        /// A project whose compiler is an inline `sh` script.
        fn compiler_for(script: &str, artifacts: &[&str]) -> (TempDir, BuildTarget, CommandCompiler) {
            let dir = TempDir::new().unwrap();
            let artifacts = artifacts
                .iter()
                .map(|a| format!("\"{a}\""))
                .collect::<Vec<_>>()
                .join(", ");
            let toml = format!(
                "[compiler]\ncommand = [\"sh\", \"-c\", {script:?}]\nartifacts = [{artifacts}]\nquiet = true\n"
            );
            let config = crate::config::test_config_at(dir.path(), &toml);
            let target = BuildTarget::from_config(&config).unwrap();
            let compiler = CommandCompiler::new(&config, &target);
            (dir, target, compiler)
        }

        const BUILD_BOTH: &str = "printf js > \"$WASP_OUT_DIR/$WASP_OUT_NAME.js\"; \
                                  printf wasm > \"$WASP_OUT_DIR/${WASP_OUT_NAME}_bg.wasm\"";

        #[test]
        fn test_compile_success_in_configured_order() {
            let (_dir, target, compiler) =
                compiler_for(BUILD_BOTH, &["${WASP_OUT_NAME}_bg.wasm", "${WASP_OUT_NAME}.js"]);
            let artifacts = compiler.compile(target.entry_file()).unwrap();

            let names: Vec<_> = artifacts.iter().map(|a| a.file_name()).collect();
            assert_eq!(names, vec!["app_bg.wasm", "app.js"]);
            assert!(artifacts.iter().all(|a| a.file_path.starts_with(target.compile_dir())));
            assert_eq!(
                artifacts[0].content_hash,
                crate::freshness::compute_bytes_hash(b"wasm")
            );
        }

        #[test]
        fn test_compile_order_follows_config_not_output() {
            let (_dir, target, compiler) =
                compiler_for(BUILD_BOTH, &["${WASP_OUT_NAME}.js", "${WASP_OUT_NAME}_bg.wasm"]);
            let artifacts = compiler.compile(target.entry_file()).unwrap();
            let names: Vec<_> = artifacts.iter().map(|a| a.file_name()).collect();
            assert_eq!(names, vec!["app.js", "app_bg.wasm"]);
        }

        #[test]
        fn test_nonzero_exit_is_failed_with_stderr() {
            let (_dir, target, compiler) =
                compiler_for("echo 'error[E0308]: mismatched types' >&2; exit 101", &["app.wasm"]);
            let err = compiler.compile(target.entry_file()).unwrap_err();
            match err {
                CompileError::Failed { code, stderr } => {
                    assert_eq!(code, Some(101));
                    assert!(stderr.contains("mismatched types"));
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[test]
        fn test_zero_exit_without_artifact_is_missing() {
            let (_dir, target, compiler) = compiler_for("exit 0", &["app.wasm"]);
            let err = compiler.compile(target.entry_file()).unwrap_err();
            assert!(
                matches!(err, CompileError::MissingArtifact(ref p) if p.ends_with("app.wasm"))
            );
        }

        #[test]
        fn test_previous_artifacts_never_reused() {
            let (_dir, target, compiler) = compiler_for(
                "[ -f \"$WASP_ROOT/once\" ] && exit 0; touch \"$WASP_ROOT/once\"; \
                 printf wasm > \"$WASP_OUT_DIR/app.wasm\"",
                &["app.wasm"],
            );
            compiler.compile(target.entry_file()).unwrap();
            // Second run exits 0 without writing: the stale file must be gone.
            let err = compiler.compile(target.entry_file()).unwrap_err();
            assert!(matches!(err, CompileError::MissingArtifact(_)));
            assert!(!target.compile_dir().join("app.wasm").exists());
        }

        #[test]
        fn test_timeout_terminates_compiler() {
            let (_dir, target, compiler) = compiler_for("sleep 30", &["app.wasm"]);
            let compiler = compiler.timeout(Duration::from_millis(300));

            let started = Instant::now();
            let err = compiler.compile(target.entry_file()).unwrap_err();
            assert!(matches!(err, CompileError::Timeout(_)));
            assert!(started.elapsed() < Duration::from_secs(10));
        }

        #[test]
        fn test_exports_profile_variable() {
            let (_dir, target, compiler) = compiler_for(
                "printf \"$WASP_PROFILE\" > \"$WASP_OUT_DIR/profile.txt\"",
                &["profile.txt"],
            );
            let artifacts = compiler.compile(target.entry_file()).unwrap();
            assert_eq!(fs::read_to_string(&artifacts[0].file_path).unwrap(), "dev");
        }
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let config = crate::config::test_config_at(
            dir.path(),
            "[compiler]\ncommand = [\"wasp-no-such-compiler\"]",
        );
        let target = BuildTarget::from_config(&config).unwrap();
        let err = CommandCompiler::new(&config, &target)
            .compile(target.entry_file())
            .unwrap_err();
        assert!(matches!(err, CompileError::Spawn { .. }));
    }
}

//! `wasp build`: one production pass, then exit.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Result, anyhow};

use crate::config::WaspConfig;
use crate::log;
use crate::pipeline::{BuildOutcome, Pipeline};

/// Run a single pass. Any stage failure is returned so the process exits
/// non-zero; the previous output directory is left untouched.
pub fn build(config: Arc<WaspConfig>) -> Result<()> {
    let pipeline = Pipeline::new(Arc::clone(&config))?;
    if config.build.clean {
        pipeline.clean()?;
    }

    let started = Instant::now();
    let outcome = pipeline
        .run()
        .map_err(|err| anyhow!("{} stage failed: {err}", err.stage()))?;

    report(&config, &outcome, started);
    Ok(())
}

fn report(config: &WaspConfig, outcome: &BuildOutcome, started: Instant) {
    let document = config.root_relative(&outcome.document.file_path);
    if outcome.is_up_to_date() {
        log!("build"; "{} is up to date", document.display());
        return;
    }

    let stages = outcome
        .stages
        .iter()
        .map(|s| s.name())
        .collect::<Vec<_>>()
        .join(" → ");
    log!("build"; "{stages} in {:.2?}", started.elapsed());
    for artifact in &outcome.document.referenced_artifacts {
        crate::debug!("build"; "{}", config.root_relative(artifact).display());
    }
    log!("build"; "wrote {}", document.display());
}

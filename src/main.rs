//! wasp - build a Rust crate to WebAssembly and serve it with live reload.

mod actor;
mod cli;
mod compiler;
mod config;
mod core;
mod embed;
mod freshness;
mod graph;
mod logger;
mod pipeline;
mod reload;
mod render;
mod utils;

use std::sync::Arc;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::WaspConfig;

fn main() -> Result<()> {
    // Ctrl+C handler before any blocking operation
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = Arc::new(WaspConfig::load(&cli)?);

    match &cli.command {
        Commands::Build { .. } => cli::build::build(config),
        Commands::Serve { .. } => cli::serve::serve(config),
    }
}

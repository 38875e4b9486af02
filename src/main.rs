//! weft - declarative asset transform & bundling engine.

mod chunk;
mod cli;
mod config;
mod core;
mod embed;
mod emit;
mod graph;
mod hmr;
mod html;
mod logger;
mod pipeline;
mod rule;
mod transform;
mod utils;
mod watch;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::BundleConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = BundleConfig::load(&cli)?;
    let mode = cli.mode();

    match &cli.command {
        Commands::Build { .. } => cli::build::build_project(&config, mode),
        Commands::Serve { .. } => cli::serve::serve_project(&config, mode),
    }
}

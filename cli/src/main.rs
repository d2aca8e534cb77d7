use std::{io, path::PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{
    areas::{run_areas, AreasArgs},
    chunks::{run_chunks, ChunksArgs},
    resolve::{run_resolve, ResolveArgs},
};
use geochunk_core::config::{self, Config};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(author, version)]
struct Cli {
    /// Path to the configuration file (defaults to $GEOCHUNK_CONFIG or
    /// $HOME/.config/geochunk/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Chunks(ChunksArgs),
    Resolve(ResolveArgs),
    Areas(AreasArgs),
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        // an explicitly given file must exist
        Some(path) => Config::load(&path),
        None => Config::load_or_default(&config::default_path()?),
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;
    debug!(?config, "loaded configuration");
    match cli.command {
        Commands::Chunks(args) => run_chunks(args, &config),
        Commands::Resolve(args) => run_resolve(args, &config),
        Commands::Areas(args) => run_areas(args, &config),
    }
}

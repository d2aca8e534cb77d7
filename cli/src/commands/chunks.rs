use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::Args;
use geochunk_core::{config::Config, index::header::discover_chunks};
use humantime::format_duration;

/// List the chunks found in the local chunk directory
#[derive(Args, Debug)]
pub struct ChunksArgs {
    /// Scan this directory instead of the configured one
    #[arg(long)]
    pub root: Option<PathBuf>,
}

/// Run the `chunks` command
pub fn run_chunks(args: ChunksArgs, config: &Config) -> Result<()> {
    let root = args
        .root
        .or_else(|| config.local.root.clone())
        .context("No chunk directory configured. Set `local.root' or pass `--root'.")?;

    let start = Instant::now();
    let chunks = discover_chunks(&root, &config.local.header)?;

    for chunk in &chunks {
        println!("{}\t{}", chunk.coverage(), chunk.locator().display());
    }

    eprintln!(
        "Found {} chunks in {}",
        chunks.len(),
        format_duration(Duration::from_millis(start.elapsed().as_millis() as u64))
    );

    Ok(())
}

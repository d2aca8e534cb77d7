use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Args;
use geochunk_core::config::Config;
use humantime::format_duration;

use super::bbox_error::parse_bbox;

/// Resolve the element source covering a bounding box
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// The bounding box as `west,south,east,north`
    #[arg(allow_hyphen_values = true)]
    pub bbox: String,
}

/// Run the `resolve` command
pub fn run_resolve(args: ResolveArgs, config: &Config) -> Result<()> {
    let bbox = parse_bbox(&args.bbox)?;
    let cache = config.build_cache()?;

    let start = Instant::now();
    let Some(source) = cache.resolve(&bbox)? else {
        eprintln!("No element source covers {bbox}");
        return Ok(());
    };
    let elapsed = start.elapsed();

    let stats = source.stats()?;
    println!("id:        {}", source.id());
    match source.coverage() {
        Some(coverage) => println!("coverage:  {coverage}"),
        None => println!("coverage:  unknown"),
    }
    println!("nodes:     {}", stats.nodes);
    println!("ways:      {}", stats.ways);
    println!("relations: {}", stats.relations);

    eprintln!(
        "Resolved {} in {}",
        bbox,
        format_duration(Duration::from_millis(elapsed.as_millis() as u64))
    );

    Ok(())
}

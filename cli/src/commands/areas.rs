use std::{
    sync::atomic::AtomicBool,
    time::{Duration, Instant},
};

use anyhow::Result;
use clap::Args;
use geochunk_core::{config::Config, multipolygon::fill_areas_batch};
use humantime::format_duration;

use super::bbox_error::parse_bbox;

/// Build the areas of all multipolygon relations inside a bounding box
#[derive(Args, Debug)]
pub struct AreasArgs {
    /// The bounding box as `west,south,east,north`
    #[arg(allow_hyphen_values = true)]
    pub bbox: String,

    /// Number of worker threads (0 means one per core)
    #[arg(long, default_value_t = 0)]
    pub workers: usize,
}

/// Run the `areas` command
pub fn run_areas(args: AreasArgs, config: &Config) -> Result<()> {
    let bbox = parse_bbox(&args.bbox)?;
    let cache = config.build_cache()?;

    let start = Instant::now();
    let Some(source) = cache.resolve(&bbox)? else {
        eprintln!("No element source covers {bbox}");
        return Ok(());
    };

    let relations = source
        .relations(&bbox)?
        .into_iter()
        .filter(|r| r.is_area())
        .collect::<Vec<_>>();

    let results = fill_areas_batch(&relations, args.workers, &AtomicBool::new(false));

    let mut total_areas = 0;
    let mut skipped = 0;
    for r in &results {
        if r.areas.is_empty() {
            skipped += 1;
        }
        total_areas += r.areas.len();
        let holes = r.areas.iter().map(|a| a.holes().len()).sum::<usize>();
        println!(
            "relation {}: {} areas, {} holes",
            r.relation_id,
            r.areas.len(),
            holes
        );
    }

    eprintln!(
        "Built {} areas from {} relations ({} without areas) in {}",
        total_areas,
        results.len(),
        skipped,
        format_duration(Duration::from_millis(start.elapsed().as_millis() as u64))
    );

    Ok(())
}

//! `fontasset sweep`: clear leftovers of crashed generations.

use std::time::Duration;

use crate::service::{self, print_json};
use crate::{GlobalArgs, SweepArgs, EXIT_OK};

/// Runs the `fontasset sweep` command.
///
/// Only run this while no generation is in progress, or with a
/// `--max-age-secs` longer than any generation takes.
pub fn run(args: &SweepArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = service::load_config(global)?;
    let cache = service::open_cache(&config)?;
    let removed = cache.sweep(Duration::from_secs(args.max_age_secs))?;
    if !global.quiet {
        eprintln!("  Removed {removed} stale director{}", if removed == 1 { "y" } else { "ies" });
    }
    print_json(&serde_json::json!({ "removed": removed }))?;
    Ok(EXIT_OK)
}

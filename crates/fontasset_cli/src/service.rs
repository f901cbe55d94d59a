//! Wiring shared by the subcommands: configuration, cache construction,
//! output and exit-code mapping.

use fontasset_cache::{
    AssetCache, AssetStore, CacheError, CacheOptions, CommandGenerator, FontStore,
};
use fontasset_config::Config;

use crate::{GlobalArgs, EXIT_BUSY, EXIT_NOT_FOUND};

/// The cache as assembled from configuration.
pub type Cache = AssetCache<FontStore, CommandGenerator>;

/// Loads the configuration named by `--config`, or the defaults.
pub fn load_config(global: &GlobalArgs) -> Result<Config, Box<dyn std::error::Error>> {
    let config = fontasset_config::load_config(global.config.as_deref())?;
    if global.verbose {
        eprintln!(
            "  Using results directory {}",
            config.storage.results_dir.display()
        );
    }
    Ok(config)
}

/// Opens the font store described by `config`.
pub fn font_store(config: &Config) -> Result<FontStore, CacheError> {
    FontStore::new(&config.storage.fonts_dir())
}

/// Assembles the cache described by `config`.
pub fn open_cache(config: &Config) -> Result<Cache, CacheError> {
    let fonts_dir = config.storage.fonts_dir();
    let store = AssetStore::new(&fonts_dir)?;
    let fonts = FontStore::new(&fonts_dir)?;
    let generator = CommandGenerator::new(&config.generator.binary, &config.generator.mode)
        .with_timeout(config.generator.timeout());
    let options = CacheOptions {
        reservation_wait: config.cache.reservation_wait(),
        poll_interval: config.cache.poll_interval(),
    };
    tracing::debug!(
        fonts_dir = %fonts_dir.display(),
        generator = %config.generator.binary.display(),
        "opened asset cache"
    );
    Ok(AssetCache::new(store, fonts, generator, options))
}

/// Prints a JSON document to stdout.
pub fn print_json(value: &serde_json::Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Maps expected cache failures to their exit codes. Everything else is
/// propagated as a hard error.
pub fn report(err: CacheError) -> Result<i32, Box<dyn std::error::Error>> {
    if err.is_routine() {
        eprintln!("error: {err}");
        Ok(EXIT_NOT_FOUND)
    } else if matches!(err, CacheError::Busy { .. }) {
        eprintln!("error: {err}");
        Ok(EXIT_BUSY)
    } else {
        Err(err.into())
    }
}

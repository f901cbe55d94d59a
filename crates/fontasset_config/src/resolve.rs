//! Environment overrides layered on top of the parsed configuration.

use crate::types::Config;

/// Overrides `storage.results_dir`.
pub const ENV_RESULT_DIR: &str = "RESULT_DIR";

/// Directory containing the generator; prefixed onto `generator.binary`.
pub const ENV_GENERATOR_DIR: &str = "LLASSETGEN_DIRECTORY";

/// Applies environment overrides using `lookup` to read variables.
///
/// Empty values are ignored. An absolute `generator.binary` is left alone by
/// `LLASSETGEN_DIRECTORY`, since joining onto an absolute path would discard
/// the directory anyway.
pub fn apply_env_overrides<F>(mut config: Config, lookup: F) -> Config
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup(ENV_RESULT_DIR).filter(|v| !v.is_empty()) {
        config.storage.results_dir = dir.into();
    }

    if let Some(dir) = lookup(ENV_GENERATOR_DIR).filter(|v| !v.is_empty()) {
        if config.generator.binary.is_relative() {
            config.generator.binary = std::path::Path::new(&dir).join(&config.generator.binary);
        }
    }

    config
}

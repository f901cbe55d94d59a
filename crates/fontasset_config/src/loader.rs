//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::resolve::apply_env_overrides;
use crate::types::Config;
use std::path::Path;

/// Loads and validates a configuration, then applies environment overrides.
///
/// With `Some(path)` the file must exist. With `None` the defaults are used.
/// `RESULT_DIR` and `LLASSETGEN_DIRECTORY` are applied last so a deployment
/// can relocate storage without editing the file.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            load_config_from_str(&content)?
        }
        None => Config::default(),
    };
    let config = apply_env_overrides(config, |key| std::env::var(key).ok());
    validate_config(&config)?;
    Ok(config)
}

/// Parses and validates a `fontasset.toml` configuration from a string.
///
/// Useful for testing without filesystem or environment dependencies.
pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that configuration values are usable.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.generator.mode.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "generator.mode must not be empty".to_string(),
        ));
    }
    if config.generator.binary.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "generator.binary must not be empty".to_string(),
        ));
    }
    if config.cache.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "cache.poll_interval_ms must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

//! Configuration types deserialized from `fontasset.toml`.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Default results directory, matching the container layout of the service.
pub const DEFAULT_RESULTS_DIR: &str = "/data/results";

/// Default generator executable name, looked up on `PATH` when not absolute.
pub const DEFAULT_GENERATOR_BINARY: &str = "llassetgen-cmd";

/// The top-level configuration parsed from `fontasset.toml`.
///
/// Every section is optional; a missing file or an empty document yields
/// [`Config::default`].
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Where fonts and generated assets are stored.
    #[serde(default)]
    pub storage: StorageConfig,
    /// How the external generator is invoked.
    #[serde(default)]
    pub generator: GeneratorConfig,
    /// Reservation wait policy for concurrent requests.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Storage locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Root directory holding the `fonts/` tree.
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
}

impl StorageConfig {
    /// Returns the directory holding uploaded fonts and their asset areas.
    pub fn fonts_dir(&self) -> PathBuf {
        self.results_dir.join("fonts")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
        }
    }
}

fn default_results_dir() -> PathBuf {
    PathBuf::from(DEFAULT_RESULTS_DIR)
}

/// External generator invocation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Path to the generator executable.
    #[serde(default = "default_binary")]
    pub binary: PathBuf,
    /// Mode selector passed as the first argument (e.g. `"atlas"`).
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Kill the generator after this many seconds. Unlimited when absent.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl GeneratorConfig {
    /// Returns the configured timeout as a [`Duration`].
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            mode: default_mode(),
            timeout_secs: None,
        }
    }
}

fn default_binary() -> PathBuf {
    PathBuf::from(DEFAULT_GENERATOR_BINARY)
}

fn default_mode() -> String {
    "atlas".to_string()
}

/// Policy for callers that find a key already being generated.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// How long a caller waits for another caller's reservation to resolve.
    #[serde(default = "default_reservation_wait_secs")]
    pub reservation_wait_secs: u64,
    /// Poll interval while waiting on a reservation.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl CacheConfig {
    /// Returns the reservation wait budget.
    pub fn reservation_wait(&self) -> Duration {
        Duration::from_secs(self.reservation_wait_secs)
    }

    /// Returns the poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            reservation_wait_secs: default_reservation_wait_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_reservation_wait_secs() -> u64 {
    600
}

fn default_poll_interval_ms() -> u64 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.storage.results_dir, PathBuf::from("/data/results"));
        assert_eq!(config.storage.fonts_dir(), PathBuf::from("/data/results/fonts"));
        assert_eq!(config.generator.binary, PathBuf::from("llassetgen-cmd"));
        assert_eq!(config.generator.mode, "atlas");
        assert!(config.generator.timeout().is_none());
        assert_eq!(config.cache.reservation_wait(), Duration::from_secs(600));
        assert_eq!(config.cache.poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn timeout_converts_to_duration() {
        let config = load_config_from_str(
            r#"
[generator]
timeout_secs = 90
"#,
        )
        .unwrap();
        assert_eq!(config.generator.timeout(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config = load_config_from_str(
            r#"
[cache]
poll_interval_ms = 25
"#,
        )
        .unwrap();
        assert_eq!(config.cache.poll_interval_ms, 25);
        assert_eq!(config.cache.reservation_wait_secs, 600);
        assert_eq!(config.generator.mode, "atlas");
    }
}

//! Parsing and validation of `fontasset.toml` service configuration files.
//!
//! This crate reads the configuration file, applies environment overrides,
//! and produces a strongly-typed [`Config`] describing where fonts and assets
//! live, how the generator is invoked, and how long callers wait on a busy key.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str};
pub use resolve::{apply_env_overrides, ENV_GENERATOR_DIR, ENV_RESULT_DIR};
pub use types::*;

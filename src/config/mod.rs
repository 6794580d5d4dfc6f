//! Configuration module for kpa-grep
//!
//! Optional settings read from `<config dir>/kpa-grep/config.toml` and
//! `KPA_GREP_*` environment variables (environment wins). A missing file
//! means defaults; the tool never writes it. Command-line flags override
//! everything here.

mod discovery;

pub use config::ConfigError;
pub use discovery::{discover_index, expand_home, resolve_index, ConfigEnv, SystemEnv};

use crate::output::OutputFormat;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "KPA_GREP";

/// Application configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// Index file used when `--index` is not given
    #[serde(default)]
    pub index: Option<PathBuf>,

    /// Cache directory used when `--cache-dir` is not given
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Default output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Print paths as stored instead of joined with the index directory
    #[serde(default)]
    pub relative: bool,

    /// NUL-terminate plain output
    #[serde(default)]
    pub print0: bool,

    /// Always build in memory
    #[serde(default)]
    pub no_cache: bool,
}

impl AppConfig {
    /// Get the path to the config file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the system config directory cannot be determined.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::Message("Could not determine config directory".to_string()))?;
        Ok(config_dir.join("kpa-grep").join("config.toml"))
    }

    /// Load the user's configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be parsed, or a
    /// value has the wrong type.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?, Environment::with_prefix(ENV_PREFIX))
    }

    /// Load from an explicit file and environment source
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::load`].
    pub fn load_from(path: &Path, environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(environment)
            .build()?
            .try_deserialize()
    }
}

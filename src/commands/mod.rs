//! Command implementations
//!
//! [`RunOptions`] merges the command line with the config file. [`run`]
//! obtains a store through the cache and hands it to the selected command:
//! `grep` prints matching images or their tags, `verify` checks them against
//! their recorded digests.

pub mod grep;
pub mod verify;

pub use grep::execute as grep;
pub use verify::execute as verify;

use crate::cache::{CacheManager, CacheStatus, Obtained};
use crate::cli::Cli;
use crate::config::{resolve_index, AppConfig, ConfigEnv};
use crate::output::{OutputFormat, OutputOptions};
use crate::query::FilterCriteria;
use crate::since::resolve_since;
use crate::KpaError;
use chrono::NaiveDateTime;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

type Result<T> = std::result::Result<T, KpaError>;

/// Everything one invocation needs, with flags and config merged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub index: PathBuf,
    pub cache_dir: Option<PathBuf>,
    pub no_cache: bool,
    pub rebuild: bool,
    pub criteria: FilterCriteria,
    pub format: OutputFormat,
    pub output: OutputOptions,
    pub relative: bool,
    pub tags_only: bool,
    pub verify: bool,
    pub quiet: bool,
}

impl RunOptions {
    /// Merge flags over config, find the index and resolve `--since`
    ///
    /// # Errors
    ///
    /// Returns `KpaError::ConfigError` if no index can be found and
    /// `KpaError::SinceError` if the since expression is not understood.
    pub fn resolve(cli: &Cli, config: &AppConfig, env: &dyn ConfigEnv, now: NaiveDateTime) -> Result<Self> {
        let index = resolve_index(cli.index.as_deref(), config, env)?;
        let since = cli
            .since
            .as_deref()
            .map(|expr| resolve_since(expr, now))
            .transpose()?;
        if let Some(since) = since {
            debug!(%since, "resolved --since");
        }

        Ok(Self {
            index,
            cache_dir: cli.cache_dir.clone().or_else(|| config.cache_dir.clone()),
            no_cache: cli.no_cache || (config.no_cache && !cli.rebuild),
            rebuild: cli.rebuild,
            criteria: cli.criteria(since),
            format: cli.output_format().unwrap_or(config.format),
            output: cli.output_options(config.print0),
            relative: cli.relative || config.relative,
            tags_only: cli.tags_only,
            verify: cli.verify,
            quiet: cli.quiet,
        })
    }

    /// Directory that stored image paths are relative to
    #[must_use]
    pub fn index_dir(&self) -> Option<&Path> {
        self.index.parent()
    }

    /// Filesystem location of a stored image path
    #[must_use]
    pub fn image_file(&self, stored: &str) -> PathBuf {
        self.index_dir()
            .map_or_else(|| PathBuf::from(stored), |dir| dir.join(stored))
    }
}

/// Obtain the store for `options.index`, through the cache unless disabled
///
/// # Errors
///
/// Returns `KpaError::CacheError` if the index is missing or invalid. Cache
/// failures fall back to an in-memory build.
pub fn open_store(options: &RunOptions) -> Result<Obtained> {
    let root = options.cache_dir.clone().or_else(CacheManager::default_root);
    let obtained = match root {
        Some(root) => {
            let manager = CacheManager::new(root);
            if options.no_cache {
                manager.uncached(&options.index)?
            } else {
                manager.obtain_or_fallback(&options.index, options.rebuild)?
            }
        }
        None => {
            if !options.no_cache {
                warn!("no cache directory available, building in memory");
            }
            CacheManager::new(PathBuf::new()).uncached(&options.index)?
        }
    };
    match obtained.status {
        CacheStatus::Hit => debug!("using cached store"),
        CacheStatus::Built(reason) => debug!(%reason, "using rebuilt store"),
        CacheStatus::Uncached => debug!("using in-memory store"),
    }
    Ok(obtained)
}

/// Run one invocation, writing results to `out`
///
/// # Errors
///
/// Returns `KpaError` if the store cannot be obtained, a query fails, or
/// writing to `out` fails.
pub fn run(options: &RunOptions, out: &mut dyn Write) -> Result<()> {
    let obtained = open_store(options)?;
    if options.verify {
        verify(&obtained.store, options, out)?;
    } else {
        grep(&obtained.store, options, out)?;
    }
    out.flush()?;
    Ok(())
}

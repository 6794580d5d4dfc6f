//! Locating the default index
//!
//! KPhotoAlbum records the album it last opened as a `configfile=` line in
//! its `kphotoalbumrc`. The lookup goes through [`ConfigEnv`] so tests can
//! supply their own environment and files.

use super::{AppConfig, ConfigError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const RC_FILE: &str = "kphotoalbumrc";

/// Process environment and filesystem as seen by discovery
pub trait ConfigEnv {
    fn var(&self, name: &str) -> Option<String>;

    fn home_dir(&self) -> Option<PathBuf>;

    fn read_to_string(&self, path: &Path) -> Option<String>;
}

/// The real environment
pub struct SystemEnv;

impl ConfigEnv for SystemEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    fn read_to_string(&self, path: &Path) -> Option<String> {
        fs::read_to_string(path).ok()
    }
}

/// Candidate `kphotoalbumrc` locations, most specific first
fn rc_candidates(env: &dyn ConfigEnv) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(xdg) = env.var("XDG_CONFIG_HOME") {
        candidates.push(PathBuf::from(xdg).join(RC_FILE));
    }
    if let Some(home) = env.home_dir() {
        candidates.push(home.join(".config").join(RC_FILE));
        candidates.push(home.join(".kde/share/config").join(RC_FILE));
        candidates.push(home.join(".kde4/share/config").join(RC_FILE));
    }
    candidates.dedup();
    candidates
}

/// Expand a leading `~` or `$HOME`
#[must_use]
pub fn expand_home(path: &str, env: &dyn ConfigEnv) -> PathBuf {
    let home = env.home_dir();
    let rest = path
        .strip_prefix("~")
        .or_else(|| path.strip_prefix("$HOME"))
        .filter(|rest| rest.is_empty() || rest.starts_with('/'));
    match (rest, home) {
        (Some(rest), Some(home)) => home.join(rest.trim_start_matches('/')),
        _ => PathBuf::from(path),
    }
}

/// Index path recorded by KPhotoAlbum, if any
#[must_use]
pub fn discover_index(env: &dyn ConfigEnv) -> Option<PathBuf> {
    for candidate in rc_candidates(env) {
        let Some(content) = env.read_to_string(&candidate) else {
            continue;
        };
        let found = content.lines().find_map(|line| {
            line.trim()
                .strip_prefix("configfile=")
                .map(str::trim)
                .filter(|value| !value.is_empty())
        });
        if let Some(value) = found {
            let index = expand_home(value, env);
            debug!(rc = %candidate.display(), index = %index.display(), "discovered index");
            return Some(index);
        }
    }
    None
}

/// Pick the index: the flag, then the config file, then discovery
///
/// # Errors
///
/// Returns `ConfigError::Message` when none of them yields a path.
pub fn resolve_index(
    flag: Option<&Path>,
    config: &AppConfig,
    env: &dyn ConfigEnv,
) -> Result<PathBuf, ConfigError> {
    if let Some(flag) = flag {
        return Ok(flag.to_path_buf());
    }
    if let Some(configured) = &config.index {
        return Ok(expand_home(&configured.to_string_lossy(), env));
    }
    discover_index(env).ok_or_else(|| {
        ConfigError::Message(
            "No index file given: pass --index, set `index` in the config file, \
             or open an album in KPhotoAlbum once"
                .to_string(),
        )
    })
}

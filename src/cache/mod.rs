//! Cache manager
//!
//! Keeps one materialized [`Store`] per index file under a cache directory:
//!
//! ```text
//! <cache>/registry/            sled registry: source path -> CacheEntry
//! <cache>/stores/<md5>-<mtime>  one published store per index generation
//! <cache>/stores/.build-*       private build directories
//! ```
//!
//! A registered store is reused only while the index mtime equals the
//! registered one and the store directory still opens. Anything else
//! rebuilds from the document. Staleness is mtime equality only; touching
//! an unchanged index forces a rebuild, and an edit that preserves the
//! mtime goes unnoticed.
//!
//! A store is built in a private directory and renamed into place, so a
//! reader never opens a half-written store. A published directory is never
//! replaced: a rebuild of the same generation gets a `.N` suffix. The
//! registry is updated after the rename, then the previous generation is
//! removed.
//!
//! Published stores are shared read-only. Within one process
//! [`Store::open`] hands out the same handle; a store locked by another
//! process is retried with a growing delay before the caller falls back.

pub mod error;
pub mod registry;

pub use error::CacheError;
pub use registry::{CacheEntry, Registry, SourceStamp};

use crate::db::{DbError, Store};
use crate::index::parse_file;
use md5::{Digest, Md5};
use std::cell::Cell;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const REGISTRY_DIR: &str = "registry";
const STORES_DIR: &str = "stores";
const BUILD_PREFIX: &str = ".build-";
const LOCK_ATTEMPTS: u32 = 5;
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(40);

/// Why a store had to be built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildReason {
    /// No registry entry for this index
    NotRegistered,
    /// Index mtime differs from the registered one
    SourceChanged,
    /// Registered store directory is gone
    ArtifactMissing,
    /// Registered store exists but cannot be read as a complete store
    ArtifactUnreadable,
    /// Caller asked for a rebuild
    Forced,
}

impl std::fmt::Display for BuildReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::NotRegistered => "not cached",
            Self::SourceChanged => "index modified",
            Self::ArtifactMissing => "cached store missing",
            Self::ArtifactUnreadable => "cached store unreadable",
            Self::Forced => "rebuild requested",
        };
        f.write_str(text)
    }
}

/// How a store was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Registered store reused without parsing the index
    Hit,
    /// Store rebuilt and published to the cache
    Built(BuildReason),
    /// One-shot in-memory store, nothing persisted
    Uncached,
}

/// A ready store and how it was obtained
pub struct Obtained {
    pub store: Store,
    pub status: CacheStatus,
}

pub struct CacheManager {
    root: PathBuf,
    builds: Cell<usize>,
}

impl CacheManager {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            builds: Cell::new(0),
        }
    }

    /// `<platform cache dir>/kpa-grep`, if the platform has one
    #[must_use]
    pub fn default_root() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join("kpa-grep"))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of index parses this manager has performed
    #[must_use]
    pub fn build_count(&self) -> usize {
        self.builds.get()
    }

    /// Return a store for `source`, reusing the cached one when still valid
    ///
    /// # Errors
    ///
    /// Returns `CacheError::SourceMissing` if the index does not exist,
    /// `CacheError::Parse` if it is invalid (nothing is cached then), and
    /// `CacheError::Io`/`CacheError::Db` when the cache itself fails.
    pub fn obtain(&self, source: &Path) -> Result<Obtained, CacheError> {
        self.obtain_with(source, false)
    }

    /// Rebuild the store for `source` unconditionally
    ///
    /// # Errors
    ///
    /// Same as [`CacheManager::obtain`].
    pub fn rebuild(&self, source: &Path) -> Result<Obtained, CacheError> {
        self.obtain_with(source, true)
    }

    /// Like [`CacheManager::obtain`], but a failing cache degrades to an
    /// in-memory build instead of an error
    ///
    /// # Errors
    ///
    /// Returns source and parse errors; cache failures are logged and
    /// swallowed.
    pub fn obtain_or_fallback(&self, source: &Path, force: bool) -> Result<Obtained, CacheError> {
        match self.obtain_with(source, force) {
            Err(err) if err.is_locked() => {
                warn!("cached store is in use by another process, building in memory");
                self.uncached(source)
            }
            Err(err) if err.is_cache_failure() => {
                warn!("cache unavailable ({err}), building in memory");
                self.uncached(source)
            }
            other => other,
        }
    }

    /// Parse `source` into a temporary store without touching the cache
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the index is missing or invalid, or the
    /// temporary store cannot be created.
    pub fn uncached(&self, source: &Path) -> Result<Obtained, CacheError> {
        if !source.exists() {
            return Err(CacheError::SourceMissing(source.to_path_buf()));
        }
        let document = parse_file(source)?;
        self.builds.set(self.builds.get() + 1);
        let store = Store::build_temporary(&source.to_string_lossy(), &document)?;
        info!(images = document.len(), "built in-memory store");
        Ok(Obtained {
            store,
            status: CacheStatus::Uncached,
        })
    }

    /// Drop the registry entry for `source` and delete its store
    ///
    /// Returns whether an entry existed.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the registry cannot be opened or the store
    /// directory cannot be removed.
    pub fn evict(&self, source: &Path) -> Result<bool, CacheError> {
        let key = registry_key(source)?;
        let removed = Registry::open(self.root.join(REGISTRY_DIR))?.remove(&key)?;
        match removed {
            Some(entry) => {
                let artifact = self.stores_dir().join(&entry.artifact);
                remove_dir_if_present(&artifact)?;
                info!(artifact = %artifact.display(), "evicted cached store");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn stores_dir(&self) -> PathBuf {
        self.root.join(STORES_DIR)
    }

    fn obtain_with(&self, source: &Path, force: bool) -> Result<Obtained, CacheError> {
        let stamp = match fs::metadata(source) {
            Ok(meta) => SourceStamp::of(&meta).map_err(|e| CacheError::Source {
                path: source.to_path_buf(),
                source: e,
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CacheError::SourceMissing(source.to_path_buf()));
            }
            Err(e) => {
                return Err(CacheError::Source {
                    path: source.to_path_buf(),
                    source: e,
                });
            }
        };
        let key = registry_key(source)?;

        // Registry is released before parsing so a slow build does not hold
        // the lock.
        let registered = {
            fs::create_dir_all(&self.root).map_err(|e| CacheError::io(&self.root, e))?;
            Registry::open(self.root.join(REGISTRY_DIR))?.get(&key)?
        };

        let reason = if force {
            BuildReason::Forced
        } else {
            match &registered {
                None => BuildReason::NotRegistered,
                Some(entry) if entry.modified != stamp => BuildReason::SourceChanged,
                Some(entry) => {
                    let artifact = self.stores_dir().join(&entry.artifact);
                    if !artifact.is_dir() {
                        BuildReason::ArtifactMissing
                    } else {
                        match open_published(&artifact) {
                            Ok(store) => {
                                debug!(source = %key, artifact = %artifact.display(), "cache hit");
                                return Ok(Obtained {
                                    store,
                                    status: CacheStatus::Hit,
                                });
                            }
                            Err(DbError::SchemaMismatch { found, expected }) => {
                                debug!(?found, expected, "cached store has wrong layout");
                                BuildReason::ArtifactUnreadable
                            }
                            Err(DbError::DecodeError(e)) => {
                                debug!("cached store metadata unreadable: {e}");
                                BuildReason::ArtifactUnreadable
                            }
                            Err(e) => return Err(e.into()),
                        }
                    }
                }
            }
        };
        info!(source = %key, %reason, "building store");

        let document = parse_file(source)?;
        self.builds.set(self.builds.get() + 1);

        let name = free_name(&self.stores_dir(), &artifact_name(&key, stamp));
        let artifact = self.publish(&name, &key, &document)?;

        let previous = Registry::open(self.root.join(REGISTRY_DIR))?.put(
            &key,
            &CacheEntry {
                modified: stamp,
                artifact: name.clone(),
            },
        )?;
        if let Some(old) = previous
            && old.artifact != name
        {
            let old_dir = self.stores_dir().join(&old.artifact);
            if let Err(e) = remove_dir_if_present(&old_dir) {
                warn!("could not remove old store {}: {e}", old_dir.display());
            }
        }

        let store = open_published(&artifact)?;
        info!(images = document.len(), artifact = %artifact.display(), "store published");
        Ok(Obtained {
            store,
            status: CacheStatus::Built(reason),
        })
    }

    /// Build into a private directory, then rename it to `name`
    ///
    /// If another invocation published under `name` first, its store is
    /// kept and ours is discarded.
    fn publish(
        &self,
        name: &str,
        source: &str,
        document: &crate::index::Document,
    ) -> Result<PathBuf, CacheError> {
        let stores = self.stores_dir();
        fs::create_dir_all(&stores).map_err(|e| CacheError::io(&stores, e))?;

        let staging = stores.join(format!("{BUILD_PREFIX}{name}-{}", std::process::id()));
        remove_dir_if_present(&staging)?;
        {
            // Dropped before the rename so sled has released the directory.
            let store = Store::build(&staging, source, document)?;
            store.flush()?;
        }

        let target = stores.join(name);
        match fs::rename(&staging, &target) {
            Ok(()) => {
                // An evicted store of the same name may still be open here.
                Store::unshare(&target);
                Ok(target)
            }
            Err(_) if target.is_dir() => {
                debug!(artifact = %target.display(), "store published concurrently, keeping it");
                remove_dir_if_present(&staging)?;
                Ok(target)
            }
            Err(e) => {
                let _ = fs::remove_dir_all(&staging);
                Err(CacheError::io(&target, e))
            }
        }
    }
}

/// Registry key: the canonical index path
fn registry_key(source: &Path) -> Result<String, CacheError> {
    let canonical = fs::canonicalize(source).map_err(|e| CacheError::Source {
        path: source.to_path_buf(),
        source: e,
    })?;
    Ok(canonical.to_string_lossy().into_owned())
}

/// Deterministic store directory name for one index generation
fn artifact_name(key: &str, stamp: SourceStamp) -> String {
    let digest = Md5::digest(key.as_bytes());
    format!("{digest:x}-{}-{}", stamp.secs, stamp.nanos)
}

/// `base`, or `base.N` for the first `N` not already taken in `stores`
fn free_name(stores: &Path, base: &str) -> String {
    let mut name = base.to_string();
    let mut suffix = 0u32;
    while stores.join(&name).exists() {
        suffix += 1;
        name = format!("{base}.{suffix}");
    }
    name
}

/// Open a published store, waiting out another process's lock
fn open_published(artifact: &Path) -> Result<Store, DbError> {
    let mut attempt = 1;
    loop {
        match Store::open(artifact) {
            Err(e) if e.is_locked() && attempt < LOCK_ATTEMPTS => {
                debug!(attempt, artifact = %artifact.display(), "store locked, retrying");
                thread::sleep(LOCK_RETRY_DELAY * attempt);
                attempt += 1;
            }
            other => return other,
        }
    }
}

fn remove_dir_if_present(dir: &Path) -> Result<(), CacheError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CacheError::io(dir, e)),
    }
}

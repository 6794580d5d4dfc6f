//! Persistent registry of built stores
//!
//! A sled database with one tree, `sources`, mapping the canonical index
//! path to a [`CacheEntry`]. sled holds an exclusive lock on the directory
//! while the registry is open, which serializes registry access between
//! processes; callers keep it open only for a lookup or an update.

use crate::db::DbError;
use bincode::{Decode, Encode};
use sled::{Db, Tree};
use std::fs::Metadata;
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Modification time of an index file
#[derive(Encode, Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceStamp {
    pub secs: i64,
    pub nanos: u32,
}

impl SourceStamp {
    /// # Errors
    ///
    /// Returns an `io::Error` if the platform does not report mtimes.
    pub fn of(metadata: &Metadata) -> io::Result<Self> {
        let modified = metadata.modified()?;
        Ok(match modified.duration_since(UNIX_EPOCH) {
            Ok(after) => Self {
                secs: i64::try_from(after.as_secs()).unwrap_or(i64::MAX),
                nanos: after.subsec_nanos(),
            },
            Err(before) => {
                let before = before.duration();
                Self {
                    secs: -i64::try_from(before.as_secs()).unwrap_or(i64::MAX),
                    nanos: before.subsec_nanos(),
                }
            }
        })
    }
}

/// Registry row for one index file
#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Index mtime the store was built from
    pub modified: SourceStamp,
    /// Store directory name under the cache's `stores/`
    pub artifact: String,
}

pub struct Registry {
    db: Db,
    sources: Tree,
}

impl Registry {
    /// # Errors
    ///
    /// Returns `DbError` if the registry cannot be opened, including when
    /// another process holds it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let db = sled::open(path)?;
        let sources = db.open_tree("sources")?;
        Ok(Self { db, sources })
    }

    /// # Errors
    ///
    /// Returns `DbError` if the lookup or decoding fails.
    pub fn get(&self, source: &str) -> Result<Option<CacheEntry>, DbError> {
        match self.sources.get(source.as_bytes())? {
            Some(value) => {
                let (entry, _): (CacheEntry, usize) =
                    bincode::decode_from_slice(&value, bincode::config::standard())?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Insert or replace the entry for `source`, returning the previous one
    ///
    /// # Errors
    ///
    /// Returns `DbError` if encoding, the write, or the flush fails.
    pub fn put(&self, source: &str, entry: &CacheEntry) -> Result<Option<CacheEntry>, DbError> {
        let value = bincode::encode_to_vec(entry, bincode::config::standard())?;
        let previous = self.sources.insert(source.as_bytes(), value)?;
        self.db.flush()?;
        match previous {
            Some(old) => {
                let (entry, _): (CacheEntry, usize) =
                    bincode::decode_from_slice(&old, bincode::config::standard())?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// # Errors
    ///
    /// Returns `DbError` if the removal or decoding fails.
    pub fn remove(&self, source: &str) -> Result<Option<CacheEntry>, DbError> {
        match self.sources.remove(source.as_bytes())? {
            Some(old) => {
                self.db.flush()?;
                let (entry, _): (CacheEntry, usize) =
                    bincode::decode_from_slice(&old, bincode::config::standard())?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Number of registered sources
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(secs: i64, artifact: &str) -> CacheEntry {
        CacheEntry {
            modified: SourceStamp { secs, nanos: 0 },
            artifact: artifact.to_string(),
        }
    }

    #[test]
    fn test_put_get_replace() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::open(dir.path().join("registry")).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.get("/p/index.xml").unwrap(), None);

        assert_eq!(registry.put("/p/index.xml", &entry(1, "one")).unwrap(), None);
        assert_eq!(registry.get("/p/index.xml").unwrap(), Some(entry(1, "one")));

        let previous = registry.put("/p/index.xml", &entry(2, "two")).unwrap();
        assert_eq!(previous, Some(entry(1, "one")));
        assert_eq!(registry.get("/p/index.xml").unwrap(), Some(entry(2, "two")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::open(dir.path().join("registry")).unwrap();
        registry.put("a", &entry(1, "x")).unwrap();
        assert_eq!(registry.remove("a").unwrap(), Some(entry(1, "x")));
        assert_eq!(registry.remove("a").unwrap(), None);
    }

    #[test]
    fn test_entries_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry");
        {
            let registry = Registry::open(&path).unwrap();
            registry.put("a", &entry(7, "seven")).unwrap();
        }
        let registry = Registry::open(&path).unwrap();
        assert_eq!(registry.get("a").unwrap(), Some(entry(7, "seven")));
    }

    #[test]
    fn test_stamp_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"x").unwrap();
        let meta = std::fs::metadata(&file).unwrap();
        let stamp = SourceStamp::of(&meta).unwrap();
        assert!(stamp.secs > 0);
        assert_eq!(stamp, SourceStamp::of(&meta).unwrap());
    }
}

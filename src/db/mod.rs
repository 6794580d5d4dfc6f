//! Materialized store for one index document
//!
//! A store is an immutable snapshot of a parsed [`Document`], written once by
//! [`Store::build`] and only read afterwards. It uses sled as the embedded
//! database backend, with one tree per table or index:
//! - `images`: path -> [`ImageRow`] (scalar fields, keyed and ordered by path)
//! - `tag_rows`: `(path, category, tag)` -> empty, one row per association
//! - `tag_index`: `(tag, category, path)` -> empty, lookup by tag value
//! - `time_index`: `(captured_at, path)` -> empty, range lookup by time
//! - `meta`: build metadata, written last so its presence marks a complete build
//!
//! sled locks a database directory for the handle that opened it. Published
//! stores are therefore opened once per process and shared: every
//! [`Store::open`] on the same directory returns a clone of the live handle.

use crate::index::{Document, Epoch};
use sled::{Batch, Db, IVec, Tree};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

pub mod error;
pub mod projection;
pub mod query;
pub mod types;

pub use error::DbError;
pub use types::{ImageRow, StoreMeta, TagIndexKey, TagRowKey, TimeKey};

/// Bumped whenever the tree layout changes
pub const LAYOUT_VERSION: u32 = 2;

const EMPTY: &[u8] = &[];

/// Read-only handle on a built store
///
/// Cloning is cheap and shares the underlying sled handle.
#[derive(Clone)]
pub struct Store {
    trees: Arc<Trees>,
}

/// sled handles of one open store
struct Trees {
    db: Db,
    images: Tree,
    tag_rows: Tree,
    tag_index: Tree,
    time_index: Tree,
    meta: Tree,
}

impl Drop for Trees {
    fn drop(&mut self) {
        // Best-effort flush; errors cannot be propagated from Drop.
        let _ = self.db.flush();
    }
}

/// Directories opened by [`Store::open`] in this process
fn open_stores() -> &'static Mutex<HashMap<PathBuf, Weak<Trees>>> {
    static OPEN: OnceLock<Mutex<HashMap<PathBuf, Weak<Trees>>>> = OnceLock::new();
    OPEN.get_or_init(Mutex::default)
}

fn shared_key(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

impl Store {
    /// Opens a store previously written by [`Store::build`]
    ///
    /// A directory this process already has open is shared, not reopened.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if sled cannot open the directory (see
    /// [`DbError::is_locked`] for another process holding it), or
    /// `DbError::SchemaMismatch` if the store is incomplete or was written
    /// by a different layout version.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let path = path.as_ref();
        let key = shared_key(path);
        let mut open = open_stores().lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(trees) = open.get(&key).and_then(Weak::upgrade) {
            debug!(store = %key.display(), "sharing open store");
            return Ok(Self { trees });
        }

        let store = Self::from_db(sled::open(path)?)?;
        let found = store.read_meta()?.map(|meta| meta.version);
        if found != Some(LAYOUT_VERSION) {
            return Err(DbError::SchemaMismatch {
                found,
                expected: LAYOUT_VERSION,
            });
        }
        open.retain(|_, trees| trees.strong_count() > 0);
        open.insert(key, Arc::downgrade(&store.trees));
        Ok(store)
    }

    /// Stop handing out the live handle for `path`
    ///
    /// Used when a new store is published at a path that may still be
    /// open under an older generation. Existing handles stay valid.
    pub fn unshare<P: AsRef<Path>>(path: P) {
        let key = shared_key(path.as_ref());
        open_stores()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
    }

    /// Builds a store at `path` from a parsed document
    ///
    /// `path` should be a fresh directory; publication under its final name
    /// is the caller's job.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if sled operations or row encoding fail.
    pub fn build<P: AsRef<Path>>(path: P, source: &str, document: &Document) -> Result<Self, DbError> {
        let store = Self::from_db(sled::open(path)?)?;
        store.load(source, document)?;
        store.flush()?;
        Ok(store)
    }

    /// Builds a store that lives only in memory and temporary files
    ///
    /// # Errors
    ///
    /// Returns `DbError` if sled operations or row encoding fail.
    pub fn build_temporary(source: &str, document: &Document) -> Result<Self, DbError> {
        let db = sled::Config::new().temporary(true).open()?;
        let store = Self::from_db(db)?;
        store.load(source, document)?;
        Ok(store)
    }

    fn from_db(db: Db) -> Result<Self, DbError> {
        let images = db.open_tree("images")?;
        let tag_rows = db.open_tree("tag_rows")?;
        let tag_index = db.open_tree("tag_index")?;
        let time_index = db.open_tree("time_index")?;
        let meta = db.open_tree("meta")?;
        Ok(Self {
            trees: Arc::new(Trees {
                db,
                images,
                tag_rows,
                tag_index,
                time_index,
                meta,
            }),
        })
    }

    /// Single pass over the document filling every tree
    fn load(&self, source: &str, document: &Document) -> Result<(), DbError> {
        let mut images = Batch::default();
        let mut tag_rows = Batch::default();
        let mut tag_index = Batch::default();
        let mut time_index = Batch::default();
        let mut row_count: u64 = 0;

        for image in &document.images {
            let row = ImageRow::from(image);
            if let Some(captured_at) = row.captured_at {
                let key = TimeKey {
                    captured_at,
                    path: image.path.clone(),
                };
                time_index.insert(Vec::<u8>::from(&key), EMPTY);
            }
            images.insert(image.path.as_bytes(), row.encode()?);

            for (category, tag) in image.tags.pairs() {
                let row_key = TagRowKey {
                    path: image.path.clone(),
                    category: category.to_string(),
                    tag: tag.to_string(),
                };
                let index_key = TagIndexKey {
                    tag: tag.to_string(),
                    category: category.to_string(),
                    path: image.path.clone(),
                };
                tag_rows.insert(Vec::<u8>::from(&row_key), EMPTY);
                tag_index.insert(Vec::<u8>::from(&index_key), EMPTY);
                row_count += 1;
            }
        }

        self.trees.images.apply_batch(images)?;
        self.trees.tag_rows.apply_batch(tag_rows)?;
        self.trees.tag_index.apply_batch(tag_index)?;
        self.trees.time_index.apply_batch(time_index)?;

        let meta = StoreMeta {
            version: LAYOUT_VERSION,
            source: source.to_string(),
            image_count: document.images.len() as u64,
            tag_row_count: row_count,
            built_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX)),
        };
        self.trees.meta.insert(
            StoreMeta::KEY,
            bincode::encode_to_vec(&meta, bincode::config::standard())?,
        )?;

        debug!(
            source,
            images = meta.image_count,
            tag_rows = meta.tag_row_count,
            "loaded store"
        );
        Ok(())
    }

    fn read_meta(&self) -> Result<Option<StoreMeta>, DbError> {
        match self.trees.meta.get(StoreMeta::KEY)? {
            Some(value) => {
                let (meta, _): (StoreMeta, usize) =
                    bincode::decode_from_slice(&value, bincode::config::standard())?;
                Ok(Some(meta))
            }
            None => Ok(None),
        }
    }

    /// Build metadata of this store
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the metadata row is missing or cannot be decoded.
    pub fn meta(&self) -> Result<StoreMeta, DbError> {
        self.read_meta()?.ok_or(DbError::SchemaMismatch {
            found: None,
            expected: LAYOUT_VERSION,
        })
    }

    /// Number of images in the store
    #[must_use]
    pub fn count(&self) -> usize {
        self.trees.images.len()
    }

    /// Check whether an image path exists in the store
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the lookup fails.
    pub fn contains(&self, path: &str) -> Result<bool, DbError> {
        Ok(self.trees.images.contains_key(path.as_bytes())?)
    }

    /// Every image path, ascending
    ///
    /// # Errors
    ///
    /// Returns `DbError` if iteration fails or a key is not UTF-8.
    pub fn list_all_paths(&self) -> Result<Vec<String>, DbError> {
        let mut paths = Vec::with_capacity(self.trees.images.len());
        for result in &self.trees.images {
            let (key, _) = result?;
            paths.push(path_from_key(&key)?);
        }
        Ok(paths)
    }

    /// Images carrying `tag` under any category
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the index scan fails or a key is corrupt.
    pub fn paths_with_tag(&self, tag: &str) -> Result<BTreeSet<String>, DbError> {
        let mut paths = BTreeSet::new();
        for result in self.trees.tag_index.scan_prefix(TagIndexKey::prefix(tag)) {
            let (key, _) = result?;
            paths.insert(TagIndexKey::try_from(key.as_ref())?.path);
        }
        Ok(paths)
    }

    /// Images captured strictly after `epoch`
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the range scan fails or a key is corrupt.
    pub fn paths_captured_after(&self, epoch: Epoch) -> Result<BTreeSet<String>, DbError> {
        let mut paths = BTreeSet::new();
        for result in self.trees.time_index.range(TimeKey::after(epoch)..) {
            let (key, _) = result?;
            paths.insert(TimeKey::try_from(key.as_ref())?.path);
        }
        Ok(paths)
    }

    /// Number of images with no capture time
    #[must_use]
    pub fn count_undated(&self) -> usize {
        self.trees.images.len().saturating_sub(self.trees.time_index.len())
    }

    /// Every distinct `(tag, category)` pair, ordered by tag then category
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the index scan fails or a key is corrupt.
    pub fn list_all_tags(&self) -> Result<Vec<(String, String)>, DbError> {
        let mut tags: Vec<(String, String)> = Vec::new();
        for result in &self.trees.tag_index {
            let (key, _) = result?;
            let key = TagIndexKey::try_from(key.as_ref())?;
            if tags.last().is_none_or(|(t, c)| *t != key.tag || *c != key.category) {
                tags.push((key.tag, key.category));
            }
        }
        Ok(tags)
    }

    /// `(category, tag)` rows of one image, ordered by category then tag
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the scan fails or a key is corrupt.
    pub fn tag_rows_of(&self, path: &str) -> Result<Vec<(String, String)>, DbError> {
        let mut rows = Vec::new();
        for result in self.trees.tag_rows.scan_prefix(TagRowKey::prefix(path)) {
            let (key, _) = result?;
            let key = TagRowKey::try_from(key.as_ref())?;
            rows.push((key.category, key.tag));
        }
        Ok(rows)
    }

    /// Scalar row of one image
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the lookup or decoding fails.
    pub fn image_row(&self, path: &str) -> Result<Option<ImageRow>, DbError> {
        match self.trees.images.get(path.as_bytes())? {
            Some(value) => Ok(Some(ImageRow::decode(&value)?)),
            None => Ok(None),
        }
    }

    /// Flush all pending writes to disk
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the flush operation fails.
    pub fn flush(&self) -> Result<(), DbError> {
        self.trees.db.flush()?;
        Ok(())
    }
}

fn path_from_key(key: &IVec) -> Result<String, DbError> {
    String::from_utf8(key.to_vec()).map_err(|e| DbError::CorruptKey {
        tree: "images",
        detail: format!("invalid UTF-8: {e}"),
    })
}

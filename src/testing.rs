//! Testing utilities for kpa-grep
//!
//! Fixture documents, a `TestStore` wrapper around an in-memory store, and
//! a `TestIndex` that writes an index file into a temporary directory.
//!
//! Only available when compiled with `cfg(test)`.

use crate::db::Store;
use crate::index::{parse_str, Document};
use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Index with four images covering the interesting shapes:
/// - `a.jpg`: every scalar field, `trip: [paris]`
/// - `b.jpg`: `trip: [paris, london]`
/// - `c.jpg`: `Keywords: [office, work]`
/// - `sub/d.jpg`: no tags, no timestamp, no optional fields
pub const SAMPLE_INDEX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<KPhotoAlbum version="7" compressed="0">
  <images>
    <image file="a.jpg" label="Eiffel" description="at night" startDate="2010-01-01T08:00:00" angle="0" md5sum="d41d8cd98f00b204e9800998ecf8427e" width="640" height="480">
      <options>
        <option name="trip"><value value="paris"/></option>
      </options>
    </image>
    <image file="b.jpg" label="b" startDate="2010-06-01T12:00:00" md5sum="12345">
      <options>
        <option name="trip"><value value="paris"/><value value="london"/></option>
      </options>
    </image>
    <image file="c.jpg" label="c" startDate="2011-01-01T00:00:00">
      <options>
        <option name="Keywords"><value value="work"/><value value="office"/></option>
      </options>
    </image>
    <image file="sub/d.jpg"/>
  </images>
</KPhotoAlbum>
"#;

/// Two-image index from the documented scenarios:
/// `a.jpg: {trip: [paris]}`, `b.jpg: {trip: [paris, london]}`
pub const SCENARIO_INDEX: &str = r#"<KPhotoAlbum version="7" compressed="0">
  <images>
    <image file="a.jpg" startDate="2012-01-01T00:00:00">
      <options><option name="trip"><value value="paris"/></option></options>
    </image>
    <image file="b.jpg" startDate="2012-01-02T00:00:00">
      <options><option name="trip"><value value="paris"/><value value="london"/></option></options>
    </image>
  </images>
</KPhotoAlbum>
"#;

/// # Panics
/// Panics if the fixture no longer parses.
#[must_use]
pub fn sample_document() -> Document {
    parse_str(SAMPLE_INDEX).expect("sample index parses")
}

/// # Panics
/// Panics if the fixture no longer parses.
#[must_use]
pub fn scenario_document() -> Document {
    parse_str(SCENARIO_INDEX).expect("scenario index parses")
}

/// In-memory store built from a document, dropped with the test
pub struct TestStore {
    store: Store,
}

impl TestStore {
    /// # Panics
    /// Panics if the store cannot be built.
    #[must_use]
    pub fn build(document: &Document) -> Self {
        let store = Store::build_temporary("test-index.xml", document)
            .expect("Failed to build test store");
        Self { store }
    }
}

impl Deref for TestStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Index file plus cache directory inside one temporary directory
///
/// Everything is removed when the value is dropped.
pub struct TestIndex {
    dir: TempDir,
    index: PathBuf,
}

impl TestIndex {
    /// Write `content` as `index.xml` in a fresh temporary directory
    ///
    /// # Panics
    /// Panics if the directory or file cannot be created.
    #[must_use]
    pub fn new(content: &str) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let index = dir.path().join("index.xml");
        fs::write(&index, content).expect("Failed to write index");
        Self { dir, index }
    }

    #[must_use]
    pub fn index(&self) -> &Path {
        &self.index
    }

    /// Directory holding the index and the images
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Cache directory next to the index
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    /// Replace the index content and move its mtime forward
    ///
    /// # Panics
    /// Panics if the file cannot be rewritten.
    pub fn rewrite(&self, content: &str) {
        let previous = fs::metadata(&self.index)
            .and_then(|m| m.modified())
            .expect("index mtime");
        fs::write(&self.index, content).expect("Failed to rewrite index");
        let file = fs::File::options()
            .write(true)
            .open(&self.index)
            .expect("reopen index");
        file.set_modified(previous + std::time::Duration::from_secs(5))
            .expect("set index mtime");
    }

    /// Write an image file under the index directory
    ///
    /// # Panics
    /// Panics if the file cannot be written.
    pub fn write_image(&self, relative: &str, content: &[u8]) {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create image dir");
        }
        fs::write(path, content).expect("write image");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_parse() {
        assert_eq!(sample_document().len(), 4);
        assert_eq!(scenario_document().len(), 2);
    }

    #[test]
    fn test_store_builds() {
        let store = TestStore::build(&sample_document());
        assert_eq!(store.count(), 4);
    }

    #[test]
    fn test_index_cleanup() {
        let dir;
        {
            let index = TestIndex::new(SCENARIO_INDEX);
            dir = index.dir().to_path_buf();
            assert!(index.index().exists());
        }
        assert!(!dir.exists());
    }

    #[test]
    fn test_rewrite_moves_mtime() {
        let index = TestIndex::new(SCENARIO_INDEX);
        let before = fs::metadata(index.index()).unwrap().modified().unwrap();
        index.rewrite(SAMPLE_INDEX);
        let after = fs::metadata(index.index()).unwrap().modified().unwrap();
        assert!(after > before);
        assert_eq!(fs::read_to_string(index.index()).unwrap(), SAMPLE_INDEX);
    }
}

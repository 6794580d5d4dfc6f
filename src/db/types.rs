//! Row and key layouts for the materialized store
//!
//! The store keeps its two logical tables and their indices in separate sled
//! trees. Composite keys join their parts with a NUL byte, which cannot occur
//! in XML text, so byte order of a key is the lexicographic order of its
//! parts. Time keys start with an order-preserving big-endian encoding of the
//! epoch seconds followed by the nanoseconds, so byte order is time order.
//!
//! # Types
//!
//! - **`ImageRow`**: scalar fields of one image (value in `images`)
//! - **`TagRowKey`**: `(path, category, tag)` triple (key in `tag_rows`)
//! - **`TagIndexKey`**: `(tag, category, path)` (key in `tag_index`)
//! - **`TimeKey`**: `(captured_at, path)` (key in `time_index`)
//! - **`StoreMeta`**: build metadata (value in `meta`)

use super::error::DbError;
use crate::index::{from_epoch, to_epoch, Epoch, ImageRecord};
use bincode::{Decode, Encode};

const SEP: u8 = 0;
const SIGN_FLIP: u64 = 1 << 63;
const EPOCH_LEN: usize = 12;

/// Scalar fields of one image
#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq)]
pub struct ImageRow {
    pub label: Option<String>,
    pub description: Option<String>,
    /// Naive capture time read as UTC
    pub captured_at: Option<Epoch>,
    pub angle: Option<i32>,
    pub content_hash: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    /// Category names in the order the document listed them
    pub categories: Vec<String>,
}

impl From<&ImageRecord> for ImageRow {
    fn from(image: &ImageRecord) -> Self {
        Self {
            label: image.label.clone(),
            description: image.description.clone(),
            captured_at: image.captured_at.map(to_epoch),
            angle: image.angle,
            content_hash: image.content_hash.clone(),
            width: image.width,
            height: image.height,
            categories: image.tags.iter().map(|(name, _)| name.to_string()).collect(),
        }
    }
}

impl ImageRow {
    /// Rebuild an `ImageRecord` without tags
    #[must_use]
    pub fn into_record(self, path: String) -> ImageRecord {
        ImageRecord {
            path,
            label: self.label,
            description: self.description,
            captured_at: self.captured_at.and_then(from_epoch),
            angle: self.angle,
            content_hash: self.content_hash,
            width: self.width,
            height: self.height,
            tags: crate::index::TagGroups::new(),
        }
    }

    /// # Errors
    ///
    /// Returns `DbError::EncodeError` if bincode serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, DbError> {
        Ok(bincode::encode_to_vec(self, bincode::config::standard())?)
    }

    /// # Errors
    ///
    /// Returns `DbError::DecodeError` if the bytes are not a valid row.
    pub fn decode(bytes: &[u8]) -> Result<Self, DbError> {
        let (row, _): (Self, usize) = bincode::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(row)
    }
}

/// Key of one `(image, category, tag)` association
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRowKey {
    pub path: String,
    pub category: String,
    pub tag: String,
}

impl TagRowKey {
    /// Prefix that selects every row of one image
    #[must_use]
    pub fn prefix(path: &str) -> Vec<u8> {
        join(&[path.as_bytes(), b""])
    }
}

impl From<&TagRowKey> for Vec<u8> {
    fn from(key: &TagRowKey) -> Self {
        join(&[key.path.as_bytes(), key.category.as_bytes(), key.tag.as_bytes()])
    }
}

impl TryFrom<&[u8]> for TagRowKey {
    type Error = DbError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let [path, category, tag] = split3("tag_rows", bytes)?;
        Ok(Self { path, category, tag })
    }
}

/// Key of the by-tag index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagIndexKey {
    pub tag: String,
    pub category: String,
    pub path: String,
}

impl TagIndexKey {
    /// Prefix that selects every image carrying `tag`
    #[must_use]
    pub fn prefix(tag: &str) -> Vec<u8> {
        join(&[tag.as_bytes(), b""])
    }
}

impl From<&TagIndexKey> for Vec<u8> {
    fn from(key: &TagIndexKey) -> Self {
        join(&[key.tag.as_bytes(), key.category.as_bytes(), key.path.as_bytes()])
    }
}

impl TryFrom<&[u8]> for TagIndexKey {
    type Error = DbError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let [tag, category, path] = split3("tag_index", bytes)?;
        Ok(Self { tag, category, path })
    }
}

/// Key of the by-capture-time index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeKey {
    pub captured_at: Epoch,
    pub path: String,
}

impl TimeKey {
    /// Smallest key strictly after every key at `epoch`
    #[must_use]
    pub fn after(epoch: Epoch) -> Vec<u8> {
        let next = match epoch.nanos.checked_add(1) {
            Some(nanos) => Epoch { nanos, ..epoch },
            None => match epoch.secs.checked_add(1) {
                Some(secs) => Epoch::from_secs(secs),
                None => return vec![0xff; EPOCH_LEN + 1],
            },
        };
        encode_epoch(next).to_vec()
    }
}

impl From<&TimeKey> for Vec<u8> {
    fn from(key: &TimeKey) -> Self {
        let mut bytes = encode_epoch(key.captured_at).to_vec();
        bytes.extend_from_slice(key.path.as_bytes());
        bytes
    }
}

impl TryFrom<&[u8]> for TimeKey {
    type Error = DbError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() < EPOCH_LEN {
            return Err(DbError::CorruptKey {
                tree: "time_index",
                detail: format!("key of {} bytes is shorter than a timestamp", bytes.len()),
            });
        }
        let (secs, rest) = bytes.split_at(8);
        let (nanos, path) = rest.split_at(4);
        let mut raw_secs = [0u8; 8];
        raw_secs.copy_from_slice(secs);
        let mut raw_nanos = [0u8; 4];
        raw_nanos.copy_from_slice(nanos);
        Ok(Self {
            captured_at: Epoch {
                secs: (u64::from_be_bytes(raw_secs) ^ SIGN_FLIP) as i64,
                nanos: u32::from_be_bytes(raw_nanos),
            },
            path: utf8("time_index", path)?,
        })
    }
}

/// Build metadata written once per store
#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq)]
pub struct StoreMeta {
    pub version: u32,
    /// Index file the store was built from
    pub source: String,
    pub image_count: u64,
    pub tag_row_count: u64,
    /// Build time, seconds since the epoch
    pub built_at: i64,
}

impl StoreMeta {
    pub const KEY: &'static [u8] = b"meta";
}

fn encode_epoch(epoch: Epoch) -> [u8; EPOCH_LEN] {
    let mut bytes = [0u8; EPOCH_LEN];
    bytes[..8].copy_from_slice(&((epoch.secs as u64) ^ SIGN_FLIP).to_be_bytes());
    bytes[8..].copy_from_slice(&epoch.nanos.to_be_bytes());
    bytes
}

fn join(parts: &[&[u8]]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(parts.iter().map(|p| p.len() + 1).sum());
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            bytes.push(SEP);
        }
        bytes.extend_from_slice(part);
    }
    bytes
}

fn split3(tree: &'static str, bytes: &[u8]) -> Result<[String; 3], DbError> {
    let mut parts = bytes.splitn(3, |b| *b == SEP);
    let (Some(a), Some(b), Some(c)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(DbError::CorruptKey {
            tree,
            detail: "expected three NUL-separated parts".into(),
        });
    };
    Ok([utf8(tree, a)?, utf8(tree, b)?, utf8(tree, c)?])
}

fn utf8(tree: &'static str, bytes: &[u8]) -> Result<String, DbError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| DbError::CorruptKey {
        tree,
        detail: format!("invalid UTF-8: {e}"),
    })
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;

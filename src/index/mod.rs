//! Source document model
//!
//! In-memory representation of a KPhotoAlbum `index.xml`: one [`ImageRecord`]
//! per `<image>` element, each carrying its scalar attributes and a
//! [`TagGroups`] mapping from category name to tag values.
//!
//! The same record type is produced by [`crate::db::Store::project`], so a
//! record read from the document and a record reconstructed from the
//! materialized store can be compared directly.

mod error;
pub mod parser;

pub use error::ParseError;
pub use parser::{parse_file, parse_str};

use bincode::{Decode, Encode};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Timestamp formats accepted in `startDate`, most specific first
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A parsed index document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// Images in document order
    pub images: Vec<ImageRecord>,
}

impl Document {
    /// Number of images in the document
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// One photo from the index
///
/// `path` is relative to the directory holding the index file. Every other
/// scalar field is optional and stays `None` when the attribute was never
/// present in the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageRecord {
    pub path: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub captured_at: Option<NaiveDateTime>,
    pub angle: Option<i32>,
    /// Content digest as written in the index; never coerced to a number
    pub content_hash: Option<String>,
    /// Pixel size as written; KPhotoAlbum uses `-1` for unknown
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub tags: TagGroups,
}

impl ImageRecord {
    /// Create a record with only a path set
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Capture time formatted the way the index writes it
    #[must_use]
    pub fn captured_at_string(&self) -> Option<String> {
        self.captured_at.map(format_timestamp)
    }
}

/// Category name to tag values, in category encounter order
///
/// Values are deduplicated per category. Insertion order of values is kept
/// as-is; [`TagGroups::normalized`] sorts them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagGroups(Vec<(String, Vec<String>)>);

impl TagGroups {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Add `value` under `category`, creating the category at the end if new
    pub fn insert(&mut self, category: &str, value: &str) {
        if let Some((_, values)) = self.0.iter_mut().find(|(name, _)| name == category) {
            if !values.iter().any(|v| v == value) {
                values.push(value.to_string());
            }
        } else {
            self.0.push((category.to_string(), vec![value.to_string()]));
        }
    }

    /// Values recorded under `category`
    #[must_use]
    pub fn get(&self, category: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, values)| values.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Every `(category, value)` pair
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().flat_map(|(name, values)| {
            values.iter().map(move |value| (name.as_str(), value.as_str()))
        })
    }

    /// True if `tag` appears under any category
    #[must_use]
    pub fn contains_tag(&self, tag: &str) -> bool {
        self.pairs().any(|(_, value)| value == tag)
    }

    /// Number of categories
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy with values sorted inside each category; category order is kept
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut groups = self.clone();
        for (_, values) in &mut groups.0 {
            values.sort();
        }
        groups
    }
}

impl FromIterator<(String, String)> for TagGroups {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut groups = Self::new();
        for (category, value) in iter {
            groups.insert(&category, &value);
        }
        groups
    }
}

impl Serialize for TagGroups {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (category, values) in &self.0 {
            map.serialize_entry(category, values)?;
        }
        map.end()
    }
}

/// Parse a `startDate` value
///
/// Accepts full timestamps with `T` or space separators, minute precision,
/// and bare dates (midnight).
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Format a timestamp as `YYYY-MM-DDTHH:MM:SS`, plus a fraction when the
/// time has one
#[must_use]
pub fn format_timestamp(value: NaiveDateTime) -> String {
    value.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

/// A point in time as seconds and nanoseconds since the epoch
///
/// `secs` is floored, so `nanos` is always the non-negative remainder and the
/// derived ordering is chronological, also before 1970.
#[derive(Encode, Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch {
    pub secs: i64,
    pub nanos: u32,
}

impl Epoch {
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self { secs, nanos: 0 }
    }
}

/// Epoch time of a naive timestamp read as UTC, keeping sub-second digits
#[must_use]
pub fn to_epoch(value: NaiveDateTime) -> Epoch {
    let utc = value.and_utc();
    Epoch {
        secs: utc.timestamp(),
        nanos: utc.timestamp_subsec_nanos(),
    }
}

/// Inverse of [`to_epoch`]
#[must_use]
pub fn from_epoch(epoch: Epoch) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(epoch.secs, epoch.nanos).map(|dt| dt.naive_utc())
}

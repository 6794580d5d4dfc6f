//! Integrity verification
//!
//! Recomputes the MD5 digest of an image file and compares it with the
//! `md5sum` recorded in the index.

use crate::index::ImageRecord;
use md5::{Digest, Md5};
use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;

/// Result of checking one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Digest matches the recorded one
    Ok,
    /// Digest differs from the recorded one
    Mismatch { expected: String, actual: String },
    /// File could not be read
    Missing(String),
    /// Index records no digest for this image
    NoHash,
}

impl VerifyOutcome {
    /// Report label, or `None` for a match
    #[must_use]
    pub const fn label(&self) -> Option<&'static str> {
        match self {
            Self::Ok => None,
            Self::Mismatch { .. } => Some("MISMATCH"),
            Self::Missing(_) => Some("MISSING"),
            Self::NoHash => Some("NOHASH"),
        }
    }

    #[must_use]
    pub const fn is_mismatch(&self) -> bool {
        matches!(self, Self::Mismatch { .. })
    }
}

impl fmt::Display for VerifyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Mismatch { expected, actual } => write!(f, "expected {expected}, got {actual}"),
            Self::Missing(reason) => write!(f, "{reason}"),
            Self::NoHash => write!(f, "no md5sum recorded"),
        }
    }
}

/// Lowercase hex MD5 of a file's content
///
/// # Errors
///
/// Returns `io::Error` if the file cannot be opened or read.
pub fn file_digest(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Check `record` against the file at `file`
#[must_use]
pub fn verify_image(record: &ImageRecord, file: &Path) -> VerifyOutcome {
    let Some(expected) = record.content_hash.as_deref() else {
        return VerifyOutcome::NoHash;
    };
    match file_digest(file) {
        Ok(actual) if actual.eq_ignore_ascii_case(expected.trim()) => VerifyOutcome::Ok,
        Ok(actual) => VerifyOutcome::Mismatch {
            expected: expected.to_string(),
            actual,
        },
        Err(e) => VerifyOutcome::Missing(e.to_string()),
    }
}

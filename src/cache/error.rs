//! Cache manager error types

use crate::db::DbError;
use crate::index::ParseError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from obtaining a store
#[derive(Debug, Error)]
pub enum CacheError {
    /// The index file does not exist
    #[error("Index {0} not found")]
    SourceMissing(PathBuf),

    /// The index file exists but its metadata cannot be read
    #[error("Cannot stat index {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Creating, renaming or removing cache files failed
    #[error("Cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Registry or store database error (includes lock contention)
    #[error("Cache database error: {0}")]
    Db(#[from] DbError),

    /// The index document itself is invalid
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the failure lies in the cache itself, so an uncached
    /// in-memory build could still succeed
    #[must_use]
    pub const fn is_cache_failure(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Db(_))
    }

    /// True when a store directory is locked by another handle
    #[must_use]
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Db(e) if e.is_locked())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_failures_allow_fallback() {
        let io_err = CacheError::io("/cache", io::Error::other("read-only"));
        assert!(io_err.is_cache_failure());
        assert!(io_err.to_string().contains("/cache"));

        let db_err = CacheError::from(DbError::SchemaMismatch {
            found: None,
            expected: 1,
        });
        assert!(db_err.is_cache_failure());
        assert!(!db_err.is_locked());
    }

    #[test]
    fn test_source_errors_are_not_cache_failures() {
        let missing = CacheError::SourceMissing(PathBuf::from("/x/index.xml"));
        assert!(!missing.is_cache_failure());
        assert_eq!(missing.to_string(), "Index /x/index.xml not found");

        let parse = CacheError::from(ParseError::DuplicateImage("a.jpg".into()));
        assert!(!parse.is_cache_failure());
        assert!(parse.to_string().contains("a.jpg"));
    }
}

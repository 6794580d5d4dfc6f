//! Store-specific error types
//!
//! This module defines the errors that can occur while building, opening or
//! reading a materialized store.
//!
//! # Error Types
//!
//! - **`SledError`**: Errors from the underlying sled embedded database
//! - **`DecodeError`**: Failures when deserializing rows from the store
//! - **`EncodeError`**: Failures when serializing rows into the store
//! - **`CorruptKey`**: A tree key that does not follow the store's layout
//! - **`SchemaMismatch`**: A store written by an incompatible layout version

use thiserror::Error;

/// Materialized store errors
#[derive(Debug, Error)]
pub enum DbError {
    /// Represents a sled database error
    #[error("Database error: {0}")]
    SledError(#[from] sled::Error),

    /// Represents a bincode decoding error
    #[error("Error while decoding data: {0}")]
    DecodeError(#[from] bincode::error::DecodeError),

    /// Represents a bincode encoding error
    #[error("Error while encoding data: {0}")]
    EncodeError(#[from] bincode::error::EncodeError),

    /// A key in one of the trees cannot be split into its parts
    #[error("Corrupt key in tree '{tree}': {detail}")]
    CorruptKey { tree: &'static str, detail: String },

    /// The store carries no metadata or an unknown layout version
    #[error("Store layout version {found:?} does not match expected {expected}")]
    SchemaMismatch { found: Option<u32>, expected: u32 },
}

impl DbError {
    /// True when sled refused a directory because another handle holds its
    /// lock, usually a concurrent invocation reading the same store
    #[must_use]
    pub fn is_locked(&self) -> bool {
        matches!(
            self,
            Self::SledError(sled::Error::Io(e)) if e.to_string().contains("could not acquire lock")
        )
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;

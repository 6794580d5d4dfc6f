//! kpa-grep - search a KPhotoAlbum index by tag, capture time and path
//!
//! The index XML is parsed once into a sled-backed materialized store that
//! is cached per index file and rebuilt when the file's mtime changes.
//! Filter criteria compile to a predicate tree that is answered from the
//! store's secondary indexes, and matching images are projected back into
//! full records for output.

use thiserror::Error;

pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod index;
pub mod output;
pub mod query;
pub mod since;
pub mod verify;

#[cfg(test)]
pub mod testing;

/// Error enum, contains all failure states of the program
#[derive(Debug, Error)]
pub enum KpaError {
    /// The index document is invalid
    #[error("Index error: {0}")]
    ParseError(#[from] index::ParseError),
    /// Store error outside the cache manager
    #[error("Database error: {0}")]
    DbError(#[from] db::DbError),
    /// The store could not be obtained
    #[error(transparent)]
    CacheError(#[from] cache::CacheError),
    /// The `--since` expression could not be resolved
    #[error("Invalid --since value: {0}")]
    SinceError(#[from] since::SinceError),
    /// Represents a configuration error
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ::config::ConfigError),
    /// Represents an I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

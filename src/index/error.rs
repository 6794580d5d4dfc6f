//! Errors raised while reading an index document
//!
//! Any of these aborts the whole build: there is no partially parsed
//! document and therefore no partial store.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Document parse errors
#[derive(Debug, Error)]
pub enum ParseError {
    /// The index file could not be read
    #[error("Cannot read index {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The markup itself is malformed
    #[error("Malformed XML near byte {position}: {source}")]
    Xml {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },

    /// The root element is not `<KPhotoAlbum>`
    #[error("Not a KPhotoAlbum index (root element is <{0}>)")]
    NotAnIndex(String),

    /// The document ends with elements still open
    #[error("Index ends before </{0}>")]
    Truncated(String),

    /// A required attribute is absent
    #[error("<{element}> near byte {position} is missing required attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
        position: usize,
    },

    /// An attribute is present but cannot be interpreted
    #[error("Invalid {attribute} '{value}' on image '{path}'")]
    InvalidAttribute {
        path: String,
        attribute: &'static str,
        value: String,
    },

    /// Two `<image>` elements share a `file` attribute
    #[error("Image '{0}' appears more than once in the index")]
    DuplicateImage(String),

    /// A compressed-form image references a value id never declared
    #[error("Image '{path}' references unknown {category} id '{id}'")]
    UnknownValueId {
        path: String,
        category: String,
        id: String,
    },
}

impl ParseError {
    pub(crate) fn xml(position: usize, source: impl Into<quick_xml::Error>) -> Self {
        Self::Xml {
            position,
            source: source.into(),
        }
    }
}

//! Output formatting for CLI display
//!
//! Every result, whether a projected image or a `(tag, category)` pair in
//! tags-only mode, goes through one [`RecordFormatter`] chosen at startup
//! by [`formatter_for`].

mod json;
mod markdown;
mod plain;
mod xml;

pub use json::JsonFormatter;
pub use markdown::MarkdownFormatter;
pub use plain::PlainFormatter;
pub use xml::XmlFormatter;

use crate::index::ImageRecord;
use clap::ValueEnum;
use serde::Deserialize;
use std::io::{self, Write};
use std::path::Path;

/// Output format selected on the command line or in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One path per line
    #[default]
    Plain,
    /// KPhotoAlbum `<image>` elements
    Xml,
    /// One JSON object per line
    Json,
    /// Markdown sections
    Markdown,
}

/// Formatter switches that apply across formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputOptions {
    /// Terminate plain lines with NUL instead of newline
    pub print0: bool,
    /// Prefix tags with their category in plain tags-only output
    pub show_category: bool,
}

/// Renders results to a writer
pub trait RecordFormatter {
    /// Write one image; `display_path` is the path as the user should see it
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if writing fails.
    fn write_record(&self, out: &mut dyn Write, record: &ImageRecord, display_path: &str) -> io::Result<()>;

    /// Write one tags-only result
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if writing fails.
    fn write_tag(&self, out: &mut dyn Write, tag: &str, category: &str) -> io::Result<()>;
}

#[must_use]
pub fn formatter_for(format: OutputFormat, options: OutputOptions) -> Box<dyn RecordFormatter> {
    match format {
        OutputFormat::Plain => Box::new(PlainFormatter::new(options)),
        OutputFormat::Xml => Box::new(XmlFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}

/// Path as printed: joined onto the index directory unless `relative`
#[must_use]
pub fn display_path(stored: &str, index_dir: Option<&Path>, relative: bool) -> String {
    match index_dir {
        Some(dir) if !relative && !dir.as_os_str().is_empty() => dir.join(stored).display().to_string(),
        _ => stored.to_string(),
    }
}

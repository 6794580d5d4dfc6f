use super::{OutputOptions, RecordFormatter};
use crate::index::ImageRecord;
use std::io::{self, Write};

/// Bare paths, newline or NUL terminated
pub struct PlainFormatter {
    options: OutputOptions,
}

impl PlainFormatter {
    #[must_use]
    pub const fn new(options: OutputOptions) -> Self {
        Self { options }
    }

    const fn terminator(&self) -> &'static [u8] {
        if self.options.print0 { b"\0" } else { b"\n" }
    }
}

impl RecordFormatter for PlainFormatter {
    fn write_record(&self, out: &mut dyn Write, _record: &ImageRecord, display_path: &str) -> io::Result<()> {
        out.write_all(display_path.as_bytes())?;
        out.write_all(self.terminator())
    }

    fn write_tag(&self, out: &mut dyn Write, tag: &str, category: &str) -> io::Result<()> {
        if self.options.show_category {
            write!(out, "{category}/{tag}")?;
        } else {
            out.write_all(tag.as_bytes())?;
        }
        out.write_all(self.terminator())
    }
}

use super::RecordFormatter;
use crate::index::ImageRecord;
use std::io::{self, Write};

/// A heading per image with one bullet per field and category
pub struct MarkdownFormatter;

impl RecordFormatter for MarkdownFormatter {
    fn write_record(&self, out: &mut dyn Write, record: &ImageRecord, display_path: &str) -> io::Result<()> {
        writeln!(out, "## {display_path}")?;
        writeln!(out)?;
        if let Some(label) = &record.label {
            writeln!(out, "- label: {label}")?;
        }
        if let Some(description) = &record.description {
            writeln!(out, "- description: {description}")?;
        }
        if let Some(start) = record.captured_at_string() {
            writeln!(out, "- startDate: {start}")?;
        }
        if let Some(angle) = record.angle {
            writeln!(out, "- angle: {angle}")?;
        }
        if let Some(hash) = &record.content_hash {
            writeln!(out, "- md5sum: `{hash}`")?;
        }
        if let (Some(width), Some(height)) = (record.width, record.height) {
            writeln!(out, "- size: {width}x{height}")?;
        } else {
            if let Some(width) = record.width {
                writeln!(out, "- width: {width}")?;
            }
            if let Some(height) = record.height {
                writeln!(out, "- height: {height}")?;
            }
        }
        for (category, values) in record.tags.iter() {
            writeln!(out, "- {category}: {}", values.join(", "))?;
        }
        writeln!(out)
    }

    fn write_tag(&self, out: &mut dyn Write, tag: &str, category: &str) -> io::Result<()> {
        writeln!(out, "- {tag} ({category})")
    }
}

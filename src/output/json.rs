use super::RecordFormatter;
use crate::index::{ImageRecord, TagGroups};
use serde::Serialize;
use std::io::{self, Write};

/// One JSON object per line
pub struct JsonFormatter;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonImage<'a> {
    file: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    angle: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    md5sum: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<i32>,
    tags: &'a TagGroups,
}

#[derive(Serialize)]
struct JsonTag<'a> {
    tag: &'a str,
    category: &'a str,
}

impl RecordFormatter for JsonFormatter {
    fn write_record(&self, out: &mut dyn Write, record: &ImageRecord, display_path: &str) -> io::Result<()> {
        let image = JsonImage {
            file: display_path,
            label: record.label.as_deref(),
            description: record.description.as_deref(),
            start_date: record.captured_at_string(),
            angle: record.angle,
            md5sum: record.content_hash.as_deref(),
            width: record.width,
            height: record.height,
            tags: &record.tags,
        };
        serde_json::to_writer(&mut *out, &image)?;
        out.write_all(b"\n")
    }

    fn write_tag(&self, out: &mut dyn Write, tag: &str, category: &str) -> io::Result<()> {
        serde_json::to_writer(&mut *out, &JsonTag { tag, category })?;
        out.write_all(b"\n")
    }
}

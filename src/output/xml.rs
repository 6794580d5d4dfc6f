use super::RecordFormatter;
use crate::index::ImageRecord;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::io::{self, Write};

/// KPhotoAlbum `<image>` elements, one per line, no surrounding document
///
/// `file` keeps the stored path so each line is a valid index fragment.
pub struct XmlFormatter;

fn to_io(err: quick_xml::Error) -> io::Error {
    io::Error::other(err)
}

impl RecordFormatter for XmlFormatter {
    fn write_record(&self, out: &mut dyn Write, record: &ImageRecord, _display_path: &str) -> io::Result<()> {
        let mut image = BytesStart::new("image");
        image.push_attribute(("file", record.path.as_str()));
        if let Some(label) = &record.label {
            image.push_attribute(("label", label.as_str()));
        }
        if let Some(description) = &record.description {
            image.push_attribute(("description", description.as_str()));
        }
        if let Some(start) = record.captured_at_string() {
            image.push_attribute(("startDate", start.as_str()));
        }
        if let Some(angle) = record.angle {
            image.push_attribute(("angle", angle.to_string().as_str()));
        }
        if let Some(hash) = &record.content_hash {
            image.push_attribute(("md5sum", hash.as_str()));
        }
        if let Some(width) = record.width {
            image.push_attribute(("width", width.to_string().as_str()));
        }
        if let Some(height) = record.height {
            image.push_attribute(("height", height.to_string().as_str()));
        }

        let mut writer = Writer::new(&mut *out);
        if record.tags.is_empty() {
            writer.write_event(Event::Empty(image)).map_err(to_io)?;
        } else {
            writer.write_event(Event::Start(image)).map_err(to_io)?;
            writer
                .write_event(Event::Start(BytesStart::new("options")))
                .map_err(to_io)?;
            for (category, values) in record.tags.iter() {
                let mut option = BytesStart::new("option");
                option.push_attribute(("name", category));
                writer.write_event(Event::Start(option)).map_err(to_io)?;
                for value in values {
                    let mut element = BytesStart::new("value");
                    element.push_attribute(("value", value.as_str()));
                    writer.write_event(Event::Empty(element)).map_err(to_io)?;
                }
                writer
                    .write_event(Event::End(BytesEnd::new("option")))
                    .map_err(to_io)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new("options")))
                .map_err(to_io)?;
            writer
                .write_event(Event::End(BytesEnd::new("image")))
                .map_err(to_io)?;
        }
        out.write_all(b"\n")
    }

    fn write_tag(&self, out: &mut dyn Write, tag: &str, category: &str) -> io::Result<()> {
        let mut element = BytesStart::new("value");
        element.push_attribute(("value", tag));
        element.push_attribute(("category", category));
        Writer::new(&mut *out)
            .write_event(Event::Empty(element))
            .map_err(to_io)?;
        out.write_all(b"\n")
    }
}

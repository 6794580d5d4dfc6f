//! Single-pass reader for KPhotoAlbum `index.xml`
//!
//! Handles both layouts KPhotoAlbum writes:
//! - uncompressed: tags nested as `<options><option name=C><value value=T/>`
//! - compressed (`compressed="1"` on the root): one attribute per category on
//!   `<image>`, holding comma-separated ids declared under `<Categories>`
//!
//! Only `<Categories>` and `<images>` are interpreted; everything else in the
//! document is skipped.

use super::{parse_timestamp, Document, ImageRecord, ParseError};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

const ROOT_ELEMENT: &[u8] = b"KPhotoAlbum";

/// Attributes of `<image>` that are never category names
const SCALAR_ATTRIBUTES: &[&str] = &[
    "file",
    "label",
    "description",
    "startDate",
    "endDate",
    "angle",
    "md5sum",
    "width",
    "height",
    "rating",
    "stackId",
    "stackOrder",
    "videoLength",
    "type",
];

/// Read and parse an index file
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, or any other
/// `ParseError` variant if the content is not a valid index.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Document, ParseError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_str(&text)
}

/// Parse index content held in memory
///
/// # Errors
///
/// Returns `ParseError` on malformed markup, a foreign root element, a
/// missing `file` attribute, unparsable scalar attributes, duplicate image
/// paths or unknown compressed value ids.
pub fn parse_str(text: &str) -> Result<Document, ParseError> {
    let mut reader = Reader::from_str(text);
    let mut state = ParserState::default();
    let mut open: Vec<Vec<u8>> = Vec::new();
    let mut saw_root = false;

    loop {
        let position = reader.buffer_position();
        let event = reader
            .read_event()
            .map_err(|err| ParseError::xml(position, err))?;

        match event {
            Event::Start(e) => {
                if !saw_root {
                    state.enter_root(&e, position)?;
                    saw_root = true;
                }
                state.open(&e, position, false)?;
                open.push(e.name().as_ref().to_vec());
            }
            Event::Empty(e) => {
                if !saw_root {
                    state.enter_root(&e, position)?;
                    saw_root = true;
                }
                state.open(&e, position, true)?;
            }
            Event::End(e) => {
                open.pop();
                state.close(e.name().as_ref())?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(name) = open.last() {
        return Err(ParseError::Truncated(
            String::from_utf8_lossy(name).into_owned(),
        ));
    }
    if !saw_root {
        return Err(ParseError::NotAnIndex("nothing".into()));
    }

    Ok(Document {
        images: state.images,
    })
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Section {
    #[default]
    Other,
    Categories,
    Images,
}

#[derive(Default)]
struct ParserState {
    compressed: bool,
    section: Section,
    category: Option<String>,
    /// category -> (id -> value)
    category_ids: HashMap<String, HashMap<String, String>>,
    image: Option<ImageRecord>,
    option: Option<String>,
    seen: HashSet<String>,
    images: Vec<ImageRecord>,
}

impl ParserState {
    fn enter_root(&mut self, e: &BytesStart, position: usize) -> Result<(), ParseError> {
        if e.name().as_ref() != ROOT_ELEMENT {
            return Err(ParseError::NotAnIndex(
                String::from_utf8_lossy(e.name().as_ref()).into_owned(),
            ));
        }
        let attrs = attributes(e, position)?;
        self.compressed = lookup(&attrs, "compressed") == Some("1");
        Ok(())
    }

    fn open(&mut self, e: &BytesStart, position: usize, empty: bool) -> Result<(), ParseError> {
        match e.name().as_ref() {
            b"Categories" if !empty => self.section = Section::Categories,
            b"Category" if self.section == Section::Categories => {
                let attrs = attributes(e, position)?;
                let name = required(&attrs, "Category", "name", position)?;
                self.category_ids.entry(name.clone()).or_default();
                if !empty {
                    self.category = Some(name);
                }
            }
            b"value" if self.section == Section::Categories => {
                if let Some(category) = &self.category {
                    let attrs = attributes(e, position)?;
                    if let (Some(value), Some(id)) = (lookup(&attrs, "value"), lookup(&attrs, "id")) {
                        self.category_ids
                            .entry(category.clone())
                            .or_default()
                            .insert(id.to_string(), value.to_string());
                    }
                }
            }
            b"images" if !empty => self.section = Section::Images,
            b"image" if self.section == Section::Images => {
                let attrs = attributes(e, position)?;
                let image = self.build_image(attrs, position)?;
                if empty {
                    self.finish_image(image)?;
                } else {
                    self.image = Some(image);
                }
            }
            b"option" if self.image.is_some() && !empty => {
                let attrs = attributes(e, position)?;
                self.option = Some(required(&attrs, "option", "name", position)?);
            }
            b"value" => {
                if let (Some(image), Some(category)) = (self.image.as_mut(), self.option.as_ref()) {
                    let attrs = attributes(e, position)?;
                    let value = required(&attrs, "value", "value", position)?;
                    image.tags.insert(category, &value);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &[u8]) -> Result<(), ParseError> {
        match name {
            b"Categories" | b"images" => self.section = Section::Other,
            b"Category" => self.category = None,
            b"option" => self.option = None,
            b"image" => {
                if let Some(image) = self.image.take() {
                    self.finish_image(image)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finish_image(&mut self, image: ImageRecord) -> Result<(), ParseError> {
        if !self.seen.insert(image.path.clone()) {
            return Err(ParseError::DuplicateImage(image.path));
        }
        self.images.push(image);
        Ok(())
    }

    fn build_image(
        &self,
        attrs: Vec<(String, String)>,
        position: usize,
    ) -> Result<ImageRecord, ParseError> {
        let path = required(&attrs, "image", "file", position)?;
        let mut image = ImageRecord::new(path);

        for (key, value) in attrs {
            match key.as_str() {
                "file" => {}
                "label" => image.label = Some(value),
                "description" => image.description = Some(value),
                "startDate" => {
                    if !value.trim().is_empty() {
                        let ts = parse_timestamp(&value).ok_or_else(|| invalid(&image, "startDate", &value))?;
                        image.captured_at = Some(ts);
                    }
                }
                "angle" => image.angle = parse_number(&image, "angle", &value)?,
                "md5sum" => {
                    if !value.is_empty() {
                        image.content_hash = Some(value);
                    }
                }
                "width" => image.width = parse_number(&image, "width", &value)?,
                "height" => image.height = parse_number(&image, "height", &value)?,
                other if self.compressed && !SCALAR_ATTRIBUTES.contains(&other) => {
                    self.resolve_compressed(&mut image, other, &value)?;
                }
                _ => {}
            }
        }

        Ok(image)
    }

    /// Expand a compressed category attribute (`Keywords="1,4"`)
    fn resolve_compressed(
        &self,
        image: &mut ImageRecord,
        attribute: &str,
        ids: &str,
    ) -> Result<(), ParseError> {
        // An exact name wins over a category whose spaces became underscores.
        let Some((category, values)) = self.category_ids.get_key_value(attribute).or_else(|| {
            self.category_ids
                .iter()
                .filter(|(name, _)| name.replace(' ', "_") == attribute)
                .min_by(|a, b| a.0.cmp(b.0))
        }) else {
            return Ok(());
        };

        for id in ids.split(',').map(str::trim).filter(|id| !id.is_empty()) {
            let value = values.get(id).ok_or_else(|| ParseError::UnknownValueId {
                path: image.path.clone(),
                category: category.clone(),
                id: id.to_string(),
            })?;
            image.tags.insert(category, value);
        }
        Ok(())
    }
}

fn attributes(e: &BytesStart, position: usize) -> Result<Vec<(String, String)>, ParseError> {
    e.attributes()
        .map(|attr| {
            let attr = attr.map_err(|err| ParseError::xml(position, err))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| ParseError::xml(position, err))?
                .into_owned();
            Ok((key, value))
        })
        .collect()
}

fn lookup<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn required(
    attrs: &[(String, String)],
    element: &'static str,
    attribute: &'static str,
    position: usize,
) -> Result<String, ParseError> {
    lookup(attrs, attribute)
        .map(str::to_string)
        .ok_or(ParseError::MissingAttribute {
            element,
            attribute,
            position,
        })
}

fn invalid(image: &ImageRecord, attribute: &'static str, value: &str) -> ParseError {
    ParseError::InvalidAttribute {
        path: image.path.clone(),
        attribute,
        value: value.to_string(),
    }
}

fn parse_number(image: &ImageRecord, attribute: &'static str, value: &str) -> Result<Option<i32>, ParseError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<i32>()
        .map(Some)
        .map_err(|_| invalid(image, attribute, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::format_timestamp;

    const UNCOMPRESSED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<KPhotoAlbum version="7" compressed="0">
  <Categories>
    <Category name="Keywords"/>
  </Categories>
  <images>
    <image file="2010/a.jpg" label="a" description="first &amp; best" startDate="2010-01-02T10:11:12" angle="90" md5sum="0123456789" width="3000" height="2000">
      <options>
        <option name="Keywords">
          <value value="office"/>
          <value value="work"/>
        </option>
        <option name="Places">
          <value value="paris"/>
        </option>
      </options>
    </image>
    <image file="2010/b.jpg"/>
  </images>
  <blocklist>
    <block file="2010/c.jpg"/>
  </blocklist>
</KPhotoAlbum>"#;

    const COMPRESSED: &str = r#"<KPhotoAlbum version="7" compressed="1">
  <Categories>
    <Category name="Keywords">
      <value value="office" id="1"/>
      <value value="trip" id="2"/>
    </Category>
    <Category name="Social Events">
      <value value="wedding" id="1"/>
    </Category>
  </Categories>
  <images>
    <image file="a.jpg" startDate="2011-05-06T07:08:09" Keywords="2,1" Social_Events="1"/>
    <image file="b.jpg" Keywords=""/>
  </images>
</KPhotoAlbum>"#;

    #[test]
    fn test_parse_uncompressed_document() {
        let doc = parse_str(UNCOMPRESSED).unwrap();
        assert_eq!(doc.len(), 2);

        let a = &doc.images[0];
        assert_eq!(a.path, "2010/a.jpg");
        assert_eq!(a.label.as_deref(), Some("a"));
        assert_eq!(a.description.as_deref(), Some("first & best"));
        assert_eq!(a.captured_at_string().as_deref(), Some("2010-01-02T10:11:12"));
        assert_eq!(a.angle, Some(90));
        assert_eq!(a.content_hash.as_deref(), Some("0123456789"));
        assert_eq!(a.width, Some(3000));
        assert_eq!(a.height, Some(2000));
        assert_eq!(a.tags.get("Keywords").unwrap(), &["office".to_string(), "work".to_string()]);
        assert_eq!(a.tags.get("Places").unwrap(), &["paris".to_string()]);
    }

    #[test]
    fn test_self_closing_image_has_absent_fields() {
        let doc = parse_str(UNCOMPRESSED).unwrap();
        let b = &doc.images[1];
        assert_eq!(b, &ImageRecord::new("2010/b.jpg"));
    }

    #[test]
    fn test_blocklist_is_ignored() {
        let doc = parse_str(UNCOMPRESSED).unwrap();
        assert!(doc.images.iter().all(|img| img.path != "2010/c.jpg"));
    }

    #[test]
    fn test_parse_compressed_document() {
        let doc = parse_str(COMPRESSED).unwrap();
        assert_eq!(doc.len(), 2);

        let a = &doc.images[0];
        assert_eq!(a.tags.get("Keywords").unwrap(), &["trip".to_string(), "office".to_string()]);
        assert_eq!(a.tags.get("Social Events").unwrap(), &["wedding".to_string()]);
        assert_eq!(format_timestamp(a.captured_at.unwrap()), "2011-05-06T07:08:09");

        assert!(doc.images[1].tags.is_empty());
    }

    #[test]
    fn test_compressed_unknown_id() {
        let text = COMPRESSED.replace("Keywords=\"2,1\"", "Keywords=\"9\"");
        let err = parse_str(&text).unwrap_err();
        assert!(matches!(err, ParseError::UnknownValueId { ref id, .. } if id == "9"));
    }

    #[test]
    fn test_compressed_exact_category_name_wins() {
        let text = r#"<KPhotoAlbum compressed="1">
  <Categories>
    <Category name="Photo Album"><value value="spaced" id="1"/></Category>
    <Category name="Photo_Album"><value value="underscored" id="1"/></Category>
    <Category name="Event Name"><value value="wedding" id="1"/></Category>
  </Categories>
  <images><image file="a.jpg" Photo_Album="1" Event_Name="1"/></images>
</KPhotoAlbum>"#;
        let doc = parse_str(text).unwrap();
        let tags = &doc.images[0].tags;
        assert_eq!(tags.get("Photo_Album"), Some(&["underscored".to_string()][..]));
        assert_eq!(tags.get("Photo Album"), None);
        assert_eq!(tags.get("Event Name"), Some(&["wedding".to_string()][..]));
    }

    #[test]
    fn test_missing_file_attribute() {
        let text = r#"<KPhotoAlbum><images><image label="x"/></images></KPhotoAlbum>"#;
        let err = parse_str(text).unwrap_err();
        assert!(matches!(
            err,
            ParseError::MissingAttribute { element: "image", attribute: "file", .. }
        ));
    }

    #[test]
    fn test_invalid_start_date() {
        let text = r#"<KPhotoAlbum><images><image file="a.jpg" startDate="yesterday"/></images></KPhotoAlbum>"#;
        let err = parse_str(text).unwrap_err();
        assert!(matches!(err, ParseError::InvalidAttribute { attribute: "startDate", .. }));
    }

    #[test]
    fn test_invalid_angle() {
        let text = r#"<KPhotoAlbum><images><image file="a.jpg" angle="left"/></images></KPhotoAlbum>"#;
        let err = parse_str(text).unwrap_err();
        assert!(matches!(err, ParseError::InvalidAttribute { attribute: "angle", .. }));
    }

    #[test]
    fn test_dimensions_kept_as_written() {
        let text = r#"<KPhotoAlbum><images><image file="a.jpg" width="-1" height=""/></images></KPhotoAlbum>"#;
        let doc = parse_str(text).unwrap();
        assert_eq!(doc.images[0].width, Some(-1));
        assert_eq!(doc.images[0].height, None);
    }

    #[test]
    fn test_numeric_hash_stays_text() {
        let text = r#"<KPhotoAlbum><images><image file="a.jpg" md5sum="000123"/></images></KPhotoAlbum>"#;
        let doc = parse_str(text).unwrap();
        assert_eq!(doc.images[0].content_hash.as_deref(), Some("000123"));
    }

    #[test]
    fn test_duplicate_image() {
        let text = r#"<KPhotoAlbum><images><image file="a.jpg"/><image file="a.jpg"/></images></KPhotoAlbum>"#;
        let err = parse_str(text).unwrap_err();
        assert!(matches!(err, ParseError::DuplicateImage(ref p) if p == "a.jpg"));
    }

    #[test]
    fn test_foreign_root() {
        let err = parse_str("<html><body/></html>").unwrap_err();
        assert!(matches!(err, ParseError::NotAnIndex(ref root) if root == "html"));
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(parse_str("").unwrap_err(), ParseError::NotAnIndex(_)));
    }

    #[test]
    fn test_truncated_document() {
        let err = parse_str(r#"<KPhotoAlbum><images><image file="a.jpg">"#).unwrap_err();
        assert!(matches!(err, ParseError::Truncated(_)));
    }

    #[test]
    fn test_mismatched_tags() {
        let err = parse_str("<KPhotoAlbum><images></image></KPhotoAlbum>").unwrap_err();
        assert!(matches!(err, ParseError::Xml { .. }));
    }

    #[test]
    fn test_parse_file_missing() {
        let err = parse_file("definitely/not/here/index.xml").unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
    }
}

//! Result projection: rebuild full records from the store
//!
//! Every output format consumes the [`ImageRecord`] produced here, so this
//! code knows nothing about rendering. Tag values come back sorted within
//! each category; categories come back in the order the document listed
//! them for that image.

use super::{DbError, Store};
use crate::index::{ImageRecord, TagGroups};

impl Store {
    /// Reconstruct one image's scalar fields and tags
    ///
    /// Returns `None` if `path` is not in the store.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the row lookup, tag scan or decoding fails.
    pub fn project(&self, path: &str) -> Result<Option<ImageRecord>, DbError> {
        let Some(row) = self.image_row(path)? else {
            return Ok(None);
        };

        // Rows arrive sorted by (category, tag); replay them in the
        // image's own category order.
        let rows = self.tag_rows_of(path)?;
        let mut tags = TagGroups::new();
        for category in &row.categories {
            for (_, tag) in rows.iter().filter(|(c, _)| c == category) {
                tags.insert(category, tag);
            }
        }

        let mut record = row.into_record(path.to_string());
        record.tags = tags;
        Ok(Some(record))
    }

    /// Project several paths, skipping any that are not in the store
    ///
    /// # Errors
    ///
    /// Returns the first `DbError` encountered.
    pub fn project_all<'a, I>(&self, paths: I) -> Result<Vec<ImageRecord>, DbError>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut records = Vec::new();
        for path in paths {
            if let Some(record) = self.project(path)? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use crate::index::{parse_str, ImageRecord};
    use crate::testing::{sample_document, TestStore};

    #[test]
    fn test_round_trip_every_image() {
        let document = sample_document();
        let store = TestStore::build(&document);

        for original in &document.images {
            let projected = store.project(&original.path).unwrap().unwrap();
            let expected = ImageRecord {
                tags: original.tags.normalized(),
                ..original.clone()
            };
            assert_eq!(projected, expected);
        }
    }

    #[test]
    fn test_project_missing_path() {
        let store = TestStore::build(&sample_document());
        assert!(store.project("nope.jpg").unwrap().is_none());
    }

    #[test]
    fn test_absent_fields_stay_absent() {
        let store = TestStore::build(&sample_document());
        let d = store.project("sub/d.jpg").unwrap().unwrap();
        assert_eq!(d.label, None);
        assert_eq!(d.description, None);
        assert_eq!(d.captured_at, None);
        assert_eq!(d.angle, None);
        assert_eq!(d.content_hash, None);
        assert_eq!(d.width, None);
        assert_eq!(d.height, None);
        assert!(d.tags.is_empty());
    }

    #[test]
    fn test_category_order_and_sorted_values() {
        let document = parse_str(
            r#"<KPhotoAlbum><images>
                <image file="x.jpg" md5sum="42">
                  <options>
                    <option name="Places"><value value="rome"/><value value="milan"/></option>
                    <option name="Keywords"><value value="food"/></option>
                  </options>
                </image>
            </images></KPhotoAlbum>"#,
        )
        .unwrap();
        let store = TestStore::build(&document);
        let x = store.project("x.jpg").unwrap().unwrap();

        let categories: Vec<_> = x.tags.iter().map(|(name, _)| name).collect();
        assert_eq!(categories, vec!["Places", "Keywords"]);
        assert_eq!(
            x.tags.get("Places").unwrap(),
            &["milan".to_string(), "rome".to_string()]
        );
        assert_eq!(x.content_hash.as_deref(), Some("42"));
    }

    #[test]
    fn test_project_all_skips_unknown() {
        let store = TestStore::build(&sample_document());
        let paths = vec!["a.jpg".to_string(), "zzz.jpg".to_string(), "b.jpg".to_string()];
        let records = store.project_all(&paths).unwrap();
        let got: Vec<_> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(got, vec!["a.jpg", "b.jpg"]);
    }
}

//! Unit tests for store key and row layouts

#[cfg(test)]
mod tests {
    use crate::db::error::DbError;
    use crate::db::types::{ImageRow, StoreMeta, TagIndexKey, TagRowKey, TimeKey};
    use crate::index::{parse_timestamp, Epoch, ImageRecord};

    #[test]
    fn test_tag_row_key_round_trip() {
        let key = TagRowKey {
            path: "2010/a.jpg".into(),
            category: "Keywords".into(),
            tag: "office".into(),
        };
        let bytes: Vec<u8> = (&key).into();
        assert!(bytes.starts_with(&TagRowKey::prefix("2010/a.jpg")));
        assert_eq!(TagRowKey::try_from(bytes.as_slice()).unwrap(), key);
    }

    #[test]
    fn test_tag_row_prefix_does_not_match_longer_path() {
        let key = TagRowKey {
            path: "a.jpg.bak".into(),
            category: "Keywords".into(),
            tag: "x".into(),
        };
        let bytes: Vec<u8> = (&key).into();
        assert!(!bytes.starts_with(&TagRowKey::prefix("a.jpg")));
    }

    #[test]
    fn test_tag_value_may_contain_separators_of_other_kinds() {
        let key = TagIndexKey {
            tag: "new york/2010".into(),
            category: "Places".into(),
            path: "dir/with spaces/a.jpg".into(),
        };
        let bytes: Vec<u8> = (&key).into();
        assert_eq!(TagIndexKey::try_from(bytes.as_slice()).unwrap(), key);
    }

    #[test]
    fn test_tag_index_key_orders_by_tag_first() {
        let a: Vec<u8> = (&TagIndexKey {
            tag: "apple".into(),
            category: "Z".into(),
            path: "z.jpg".into(),
        })
            .into();
        let b: Vec<u8> = (&TagIndexKey {
            tag: "banana".into(),
            category: "A".into(),
            path: "a.jpg".into(),
        })
            .into();
        assert!(a < b);
    }

    #[test]
    fn test_corrupt_tag_key() {
        let err = TagRowKey::try_from(b"no-separators".as_slice()).unwrap_err();
        assert!(matches!(err, DbError::CorruptKey { tree: "tag_rows", .. }));
    }

    #[test]
    fn test_time_key_order_matches_numeric_order() {
        let times = [
            Epoch::from_secs(-86_400),
            Epoch { secs: -1, nanos: 999_999_999 },
            Epoch::from_secs(0),
            Epoch { secs: 0, nanos: 1 },
            Epoch::from_secs(1),
            Epoch { secs: 1_262_304_000, nanos: 500_000_000 },
        ];
        let keys: Vec<Vec<u8>> = times
            .iter()
            .map(|&t| (&TimeKey { captured_at: t, path: "a".into() }).into())
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_time_key_round_trip() {
        let key = TimeKey {
            captured_at: Epoch { secs: -12_345, nanos: 250 },
            path: "old/scan.tif".into(),
        };
        let bytes: Vec<u8> = (&key).into();
        assert_eq!(TimeKey::try_from(bytes.as_slice()).unwrap(), key);
    }

    #[test]
    fn test_time_key_after_is_strict() {
        let at: Vec<u8> = (&TimeKey { captured_at: Epoch::from_secs(100), path: "zzz".into() }).into();
        let next: Vec<u8> = (&TimeKey { captured_at: Epoch::from_secs(101), path: String::new() }).into();
        let bound = TimeKey::after(Epoch::from_secs(100));
        assert!(at < bound);
        assert!(next >= bound);
    }

    #[test]
    fn test_time_key_after_sees_fractions() {
        let half: Vec<u8> = (&TimeKey {
            captured_at: Epoch { secs: 100, nanos: 500_000_000 },
            path: String::new(),
        })
            .into();
        assert!(half >= TimeKey::after(Epoch::from_secs(100)));
        assert!(half < TimeKey::after(Epoch { secs: 100, nanos: 500_000_000 }));
    }

    #[test]
    fn test_short_time_key() {
        let err = TimeKey::try_from([1u8, 2, 3].as_slice()).unwrap_err();
        assert!(matches!(err, DbError::CorruptKey { tree: "time_index", .. }));
    }

    #[test]
    fn test_image_row_preserves_absent_fields() {
        let mut image = ImageRecord::new("a.jpg");
        image.label = Some(String::new());
        image.captured_at = parse_timestamp("2010-01-02T03:04:05.250");
        image.tags.insert("Places", "paris");
        image.tags.insert("Keywords", "trip");

        let row = ImageRow::from(&image);
        assert_eq!(row.categories, vec!["Places".to_string(), "Keywords".to_string()]);

        let decoded = ImageRow::decode(&row.encode().unwrap()).unwrap();
        assert_eq!(decoded, row);

        let record = decoded.into_record("a.jpg".into());
        assert_eq!(record.label.as_deref(), Some(""));
        assert_eq!(record.description, None);
        assert_eq!(record.angle, None);
        assert_eq!(record.captured_at, image.captured_at);
        assert!(record.tags.is_empty());
    }

    #[test]
    fn test_store_meta_encoding() {
        let meta = StoreMeta {
            version: 1,
            source: "/photos/index.xml".into(),
            image_count: 2,
            tag_row_count: 3,
            built_at: 0,
        };
        let bytes = bincode::encode_to_vec(&meta, bincode::config::standard()).unwrap();
        let (decoded, _): (StoreMeta, usize) =
            bincode::decode_from_slice(&bytes, bincode::config::standard()).unwrap();
        assert_eq!(decoded, meta);
    }
}

//! Unit tests for store error types

#[cfg(test)]
mod tests {
    use crate::db::error::DbError;
    use std::error::Error;

    #[test]
    fn test_corrupt_key_display() {
        let error = DbError::CorruptKey {
            tree: "tag_rows",
            detail: "missing separator".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Corrupt key in tree 'tag_rows': missing separator"
        );
    }

    #[test]
    fn test_schema_mismatch_display() {
        let error = DbError::SchemaMismatch {
            found: Some(0),
            expected: 1,
        };
        let display = format!("{}", error);
        assert!(display.contains("Some(0)"));
        assert!(display.contains("expected 1"));
    }

    #[test]
    fn test_schema_mismatch_without_version() {
        let error = DbError::SchemaMismatch {
            found: None,
            expected: 1,
        };
        assert!(error.to_string().contains("None"));
    }

    #[test]
    fn test_error_debug() {
        let error = DbError::CorruptKey {
            tree: "images",
            detail: "bad utf-8".to_string(),
        };
        let debug = format!("{:?}", error);
        assert!(debug.contains("CorruptKey"));
        assert!(debug.contains("bad utf-8"));
    }

    #[test]
    fn test_error_source() {
        let error = DbError::CorruptKey {
            tree: "images",
            detail: String::new(),
        };
        assert!(error.source().is_none());
    }

    #[test]
    fn test_decode_error_conversion() {
        let result: Result<(u32, usize), _> =
            bincode::decode_from_slice(&[], bincode::config::standard());
        let error: DbError = result.unwrap_err().into();
        assert!(matches!(error, DbError::DecodeError(_)));
        assert!(error.to_string().starts_with("Error while decoding data"));
    }

    #[test]
    fn test_second_sled_handle_is_locked() {
        let dir = tempfile::tempdir().unwrap();
        let _held = sled::open(dir.path()).unwrap();
        let error: DbError = sled::open(dir.path()).err().unwrap().into();
        assert!(error.is_locked());
        assert!(!DbError::CorruptKey {
            tree: "images",
            detail: String::new(),
        }
        .is_locked());
    }
}

//! Core data models and protocol vocabulary for tusk

pub mod checksum;
pub mod error;
pub mod headers;
pub mod protocol;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use checksum::ChecksumRegistry;
pub use error::*;
pub use headers::*;
pub use protocol::*;
pub use types::*;

/// Result type alias for tusk operations
pub type Result<T> = std::result::Result<T, TuskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_id_generation() {
        let a = UploadId::generate();
        let b = UploadId::generate();
        assert_ne!(a, b);
        assert!(UploadId::new(a.as_str()).is_ok());
    }

    #[test]
    fn test_upload_id_validation() {
        assert!(UploadId::new("01hv3k").is_ok());
        assert!(UploadId::new("upload_123-a").is_ok());

        assert!(UploadId::new("").is_err());
        assert!(UploadId::new("../etc/passwd").is_err());
        assert!(UploadId::new("a/b").is_err());
    }

    #[test]
    fn test_metadata_parse_and_encode() {
        let metadata =
            Metadata::parse_header("filename d29ybGRfZG9taW5hdGlvbl9wbGFuLnBkZg==,is_confidential")
                .unwrap();

        assert_eq!(metadata.get_str("filename"), Some("world_domination_plan.pdf"));
        assert_eq!(metadata.get("is_confidential"), Some(&b""[..]));

        let reparsed = Metadata::parse_header(&metadata.to_header().unwrap()).unwrap();
        assert_eq!(reparsed, metadata);
    }

    #[test]
    fn test_metadata_duplicate_key_last_wins() {
        // "Zmlyc3Q=" = "first", "c2Vjb25k" = "second"
        let metadata = Metadata::parse_header("name Zmlyc3Q=, name c2Vjb25k").unwrap();
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata.get_str("name"), Some("second"));
    }

    #[test]
    fn test_metadata_rejects_bad_base64() {
        assert!(matches!(
            Metadata::parse_header("name ###"),
            Err(TuskError::InvalidMetadata(_))
        ));
    }

    #[test]
    fn test_metadata_keeps_raw_bytes() {
        let mut metadata = Metadata::new();
        metadata.insert("blob", vec![0xff, 0x00, 0xfe]).unwrap();

        let reparsed = Metadata::parse_header(&metadata.to_header().unwrap()).unwrap();
        assert_eq!(reparsed.get("blob"), Some(&[0xff, 0x00, 0xfe][..]));
        assert_eq!(reparsed.get_str("blob"), None);
    }

    #[test]
    fn test_metadata_key_validation() {
        let mut metadata = Metadata::new();
        assert!(metadata.insert("", "x").is_err());
        assert!(metadata.insert("has space", "x").is_err());
        assert!(metadata.insert("has,comma", "x").is_err());
        assert!(metadata.insert("filename", "x").is_ok());
        assert_eq!(Metadata::new().to_header(), None);
    }

    #[test]
    fn test_record_append_rules() {
        let mut record = UploadRecord::new(
            UploadId::generate(),
            100,
            Metadata::new(),
            Some("sha1".to_string()),
            "blobs/x.bin".to_string(),
        );

        assert_eq!(record.check_append(0, 40).unwrap(), 40);
        assert!(matches!(
            record.check_append(10, 40),
            Err(TuskError::OffsetMismatch { expected: 0, actual: 10 })
        ));
        assert!(matches!(
            record.check_append(0, 101),
            Err(TuskError::LengthExceeded { .. })
        ));

        record.offset = 100;
        assert!(record.is_complete());
        assert!(matches!(
            record.check_append(100, 1),
            Err(TuskError::UploadComplete { .. })
        ));
        assert_eq!(record.check_append(100, 0).unwrap(), 100);
    }
}

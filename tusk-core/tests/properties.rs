//! Property-based tests for tusk core

use proptest::prelude::*;
use tusk_core::*;

proptest! {
    #[test]
    fn props_accepted_appends_advance_offset_by_chunk_length(
        total in 1u64..100_000,
        chunks in prop::collection::vec(0u64..5_000, 1..40)
    ) {
        let mut record = UploadRecord::new(
            UploadId::generate(),
            total,
            Metadata::new(),
            None,
            String::new(),
        );

        for len in chunks {
            let before = record.offset;
            match record.check_append(before, len) {
                Ok(new_offset) => {
                    prop_assert_eq!(new_offset, before + len);
                    prop_assert!(new_offset <= total);
                    record.offset = new_offset;
                }
                Err(TuskError::LengthExceeded { .. }) => {
                    prop_assert!(before + len > total);
                }
                Err(TuskError::UploadComplete { .. }) => {
                    prop_assert!(record.is_complete() && len > 0);
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
            prop_assert!(record.offset >= before);
        }
    }

    #[test]
    fn props_stale_offset_is_always_a_conflict(
        total in 2u64..10_000,
        offset_seed in any::<u64>(),
        claimed_seed in any::<u64>(),
    ) {
        let mut record = UploadRecord::new(UploadId::generate(), total, Metadata::new(), None, String::new());
        record.offset = offset_seed % total;
        let claimed = claimed_seed % total;
        prop_assume!(claimed != record.offset);

        let is_offset_mismatch = matches!(
            record.check_append(claimed, 1),
            Err(TuskError::OffsetMismatch { .. })
        );
        prop_assert!(is_offset_mismatch);
    }

    #[test]
    fn props_metadata_header_preserves_values(
        entries in prop::collection::btree_map("[a-zA-Z0-9_.-]{1,16}", prop::collection::vec(any::<u8>(), 0..64), 0..8)
    ) {
        let mut metadata = Metadata::new();
        for (key, value) in &entries {
            metadata.insert(key.clone(), value.clone()).unwrap();
        }

        let decoded = match metadata.to_header() {
            Some(header) => Metadata::parse_header(&header).unwrap(),
            None => Metadata::new(),
        };

        prop_assert_eq!(decoded.len(), entries.len());
        for (key, value) in &entries {
            prop_assert_eq!(decoded.get(key), Some(value.as_slice()));
        }
    }
}

//! Test utilities and infrastructure for tusk testing

use crate::{header, Headers, TUS_VERSION};

/// Deterministic payload whose bytes differ between neighbouring chunks,
/// so misplaced chunks show up as content mismatches.
pub fn patterned_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Headers with the version header plus the given pairs
pub fn tus_headers(pairs: &[(&str, &str)]) -> Headers {
    let mut headers = Headers::new().with(header::TUS_RESUMABLE, TUS_VERSION);
    for (name, value) in pairs {
        headers.insert(name, *value);
    }
    headers
}

/// Headers for a PATCH claiming `offset`
pub fn patch_headers(offset: u64) -> Headers {
    tus_headers(&[
        (header::UPLOAD_OFFSET, &offset.to_string()),
        (header::CONTENT_TYPE, crate::OFFSET_CONTENT_TYPE),
    ])
}

/// Offsets and lengths of the chunks a sequential upload would send
pub fn chunk_plan(total: u64, chunk_size: u64) -> Vec<(u64, u64)> {
    assert!(chunk_size > 0, "chunk size must be positive");

    let mut plan = Vec::new();
    let mut offset = 0;
    while offset < total {
        let len = chunk_size.min(total - offset);
        plan.push((offset, len));
        offset += len;
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_plan_covers_total() {
        assert_eq!(chunk_plan(3072, 1024), vec![(0, 1024), (1024, 1024), (2048, 1024)]);
        assert_eq!(chunk_plan(2500, 1024), vec![(0, 1024), (1024, 1024), (2048, 452)]);
        assert!(chunk_plan(0, 1024).is_empty());
    }

    #[test]
    fn test_patterned_bytes_differ_between_chunks() {
        let data = patterned_bytes(2048);
        assert_ne!(data[..1024], data[1024..]);
    }
}

//! Source fingerprints for cross-session resume

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Bytes of a stream's head mixed into its fingerprint
pub const PREFIX_BLOCK: usize = 64 * 1024;

/// Fingerprint of a file from its identity: canonical path, size and
/// modification time. Content is not read, so equal inputs give equal
/// fingerprints across processes.
pub fn for_path(path: &Path, size: u64, modified: Option<SystemTime>) -> String {
    let mtime_nanos = modified
        .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_nanos());

    let mut hasher = blake3::Hasher::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update(&[0]);
    hasher.update(&size.to_le_bytes());
    hasher.update(&mtime_nanos.to_le_bytes());

    format!("size:{}--blake3:{}", size, hasher.finalize().to_hex())
}

/// Fingerprint of a source with no path: its size plus a digest of the
/// first [`PREFIX_BLOCK`] bytes
pub fn for_content(prefix: &[u8], size: u64) -> String {
    let head = &prefix[..prefix.len().min(PREFIX_BLOCK)];
    format!("size:{}--blake3:{}", size, blake3::hash(head).to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_path_fingerprint_is_stable() {
        let path = Path::new("/data/report.pdf");
        let mtime = UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        assert_eq!(for_path(path, 10, Some(mtime)), for_path(path, 10, Some(mtime)));
        assert_ne!(for_path(path, 10, Some(mtime)), for_path(path, 11, Some(mtime)));
        assert_ne!(
            for_path(path, 10, Some(mtime)),
            for_path(path, 10, Some(mtime + Duration::from_secs(1)))
        );
        assert_ne!(
            for_path(path, 10, Some(mtime)),
            for_path(Path::new("/data/other.pdf"), 10, Some(mtime))
        );
    }

    #[test]
    fn test_content_fingerprint_reads_only_the_head() {
        let mut a = vec![1u8; PREFIX_BLOCK + 10];
        let b = a.clone();
        a[PREFIX_BLOCK + 5] = 2;

        assert_eq!(for_content(&a, 100), for_content(&b, 100));
        assert_ne!(for_content(&a, 100), for_content(&b, 101));
        assert!(for_content(b"abc", 3).starts_with("size:3--blake3:"));
    }
}

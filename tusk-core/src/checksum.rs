//! Checksum extension: named digest algorithms
//!
//! `Upload-Checksum` carries `<algorithm> <base64 digest>`. Algorithms are
//! looked up by name so new ones can be registered without touching the
//! request state machine.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::{Result, TuskError};

/// Digest function: bytes in, raw digest out
pub type DigestFn = fn(&[u8]) -> Vec<u8>;

/// The algorithm every client and server in this workspace understands
pub const DEFAULT_ALGORITHM: &str = "sha1";

fn sha1_digest(data: &[u8]) -> Vec<u8> {
    Sha1::digest(data).to_vec()
}

fn sha256_digest(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data).to_vec()
}

fn md5_digest(data: &[u8]) -> Vec<u8> {
    md5::compute(data).0.to_vec()
}

/// Registry of digest algorithms keyed by their protocol name
#[derive(Clone)]
pub struct ChecksumRegistry {
    algorithms: BTreeMap<String, DigestFn>,
}

impl ChecksumRegistry {
    /// Registry with no algorithms
    pub fn empty() -> Self {
        ChecksumRegistry {
            algorithms: BTreeMap::new(),
        }
    }

    /// Add or replace an algorithm
    pub fn register(&mut self, name: &str, digest: DigestFn) {
        self.algorithms.insert(name.to_ascii_lowercase(), digest);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.algorithms.contains_key(&name.to_ascii_lowercase())
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.algorithms.keys().map(String::as_str).collect()
    }

    /// Raw digest of `data` under `algorithm`
    pub fn digest(&self, algorithm: &str, data: &[u8]) -> Result<Vec<u8>> {
        let digest = self
            .algorithms
            .get(&algorithm.to_ascii_lowercase())
            .ok_or_else(|| TuskError::UnsupportedChecksum(algorithm.to_string()))?;
        Ok(digest(data))
    }

    /// `Upload-Checksum` value for `data`
    pub fn header_value(&self, algorithm: &str, data: &[u8]) -> Result<String> {
        let digest = self.digest(algorithm, data)?;
        Ok(format!("{} {}", algorithm.to_ascii_lowercase(), BASE64.encode(digest)))
    }

    /// Check `data` against an `Upload-Checksum` value.
    ///
    /// `Ok(false)` means the digest did not match; malformed values and
    /// unknown algorithms are errors.
    pub fn verify(&self, header_value: &str, data: &[u8]) -> Result<bool> {
        let (algorithm, expected) = parse_header(header_value)?;
        let actual = self.digest(&algorithm, data)?;
        Ok(actual == expected)
    }
}

impl Default for ChecksumRegistry {
    fn default() -> Self {
        let mut registry = ChecksumRegistry::empty();
        registry.register("sha1", sha1_digest);
        registry.register("sha256", sha256_digest);
        registry.register("md5", md5_digest);
        registry
    }
}

impl std::fmt::Debug for ChecksumRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecksumRegistry")
            .field("algorithms", &self.names())
            .finish()
    }
}

/// Split an `Upload-Checksum` value into algorithm name and decoded digest
pub fn parse_header(value: &str) -> Result<(String, Vec<u8>)> {
    let (algorithm, encoded) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| TuskError::UnsupportedChecksum(format!("malformed checksum '{}'", value)))?;

    let digest = BASE64
        .decode(encoded.trim())
        .map_err(|e| TuskError::UnsupportedChecksum(format!("digest is not base64: {}", e)))?;

    Ok((algorithm.to_ascii_lowercase(), digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha1_header_matches_known_digest() {
        let registry = ChecksumRegistry::default();
        // sha1("hello") = aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d
        let value = registry.header_value("sha1", b"hello").unwrap();
        assert_eq!(value, "sha1 qvTGHdzF6KLavt4PO0gs2a6pQ00=");
        assert!(registry.verify(&value, b"hello").unwrap());
        assert!(!registry.verify(&value, b"hellO").unwrap());
    }

    #[test]
    fn test_unknown_algorithm_is_rejected() {
        let registry = ChecksumRegistry::default();
        assert!(matches!(
            registry.verify("crc32 AAAA", b"data"),
            Err(TuskError::UnsupportedChecksum(_))
        ));
    }

    #[test]
    fn test_malformed_header_is_rejected() {
        let registry = ChecksumRegistry::default();
        assert!(registry.verify("sha1", b"data").is_err());
        assert!(registry.verify("sha1 !!not-base64!!", b"data").is_err());
    }

    #[test]
    fn test_custom_algorithm_can_be_registered() {
        fn first_byte(data: &[u8]) -> Vec<u8> {
            data.iter().take(1).copied().collect()
        }

        let mut registry = ChecksumRegistry::empty();
        assert!(!registry.contains("sha1"));

        registry.register("First", first_byte);
        assert!(registry.contains("first"));
        assert_eq!(registry.names(), vec!["first"]);

        let value = registry.header_value("first", b"xyz").unwrap();
        assert!(registry.verify(&value, b"xab").unwrap());
    }
}

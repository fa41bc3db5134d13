//! Core data types for tusk

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque, server-generated upload identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UploadId(String);

impl UploadId {
    /// Generate a fresh, time-ordered identifier
    pub fn generate() -> Self {
        UploadId(ulid::Ulid::new().to_string().to_lowercase())
    }

    /// Parse an identifier taken from a request path
    pub fn new(id: &str) -> crate::Result<Self> {
        if id.is_empty() {
            return Err(crate::TuskError::InvalidUploadId("empty id".to_string()));
        }

        // Ids end up in file names, so keep them to a safe alphabet
        if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(crate::TuskError::InvalidUploadId(format!(
                "invalid characters in '{}'",
                id
            )));
        }

        Ok(UploadId(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Upload metadata: string keys mapped to raw byte values.
///
/// On the wire this is the `Upload-Metadata` header, a comma separated list
/// of `key base64(value)` pairs. When a key appears more than once the last
/// occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata(BTreeMap<String, Vec<u8>>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous value for the key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> crate::Result<()> {
        let key = key.into();
        Self::validate_key(&key)?;
        self.0.insert(key, value.into());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// Value for `key` if it is valid UTF-8
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| std::str::from_utf8(v).ok())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Keys must be non-empty and free of whitespace and commas
    pub fn validate_key(key: &str) -> crate::Result<()> {
        if key.is_empty() {
            return Err(crate::TuskError::InvalidMetadata("empty key".to_string()));
        }
        if key.chars().any(|c| c.is_whitespace() || c == ',') {
            return Err(crate::TuskError::InvalidMetadata(format!(
                "key '{}' contains whitespace or commas",
                key
            )));
        }
        Ok(())
    }

    /// Decode an `Upload-Metadata` header value
    pub fn parse_header(value: &str) -> crate::Result<Self> {
        let mut metadata = Metadata::new();

        for pair in value.split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }

            let (key, encoded) = match pair.split_once(' ') {
                Some((key, encoded)) => (key, encoded.trim()),
                None => (pair, ""),
            };

            let decoded = BASE64.decode(encoded).map_err(|e| {
                crate::TuskError::InvalidMetadata(format!("value for '{}' is not base64: {}", key, e))
            })?;

            metadata.insert(key, decoded)?;
        }

        Ok(metadata)
    }

    /// Encode as an `Upload-Metadata` header value, `None` when empty
    pub fn to_header(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        let pairs: Vec<String> = self
            .0
            .iter()
            .map(|(key, value)| {
                if value.is_empty() {
                    key.clone()
                } else {
                    format!("{} {}", key, BASE64.encode(value))
                }
            })
            .collect();

        Some(pairs.join(","))
    }
}

/// Persistent state of one upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: UploadId,
    pub total_length: u64,
    pub offset: u64,
    pub metadata: Metadata,
    /// Digest the server was configured with when the upload was created
    pub checksum_algorithm: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Where the backend keeps the upload's bytes
    pub content_location: String,
}

impl UploadRecord {
    pub fn new(
        id: UploadId,
        total_length: u64,
        metadata: Metadata,
        checksum_algorithm: Option<String>,
        content_location: String,
    ) -> Self {
        UploadRecord {
            id,
            total_length,
            offset: 0,
            metadata,
            checksum_algorithm,
            created_at: Utc::now(),
            content_location,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.offset >= self.total_length
    }

    pub fn remaining(&self) -> u64 {
        self.total_length.saturating_sub(self.offset)
    }

    /// Check a chunk claimed at `claimed_offset` against the record.
    ///
    /// Every backend runs this inside its per-upload critical section, so the
    /// compare-and-swap rules live in one place.
    pub fn check_append(&self, claimed_offset: u64, chunk_len: u64) -> crate::Result<u64> {
        if self.is_complete() && chunk_len > 0 {
            return Err(crate::TuskError::UploadComplete {
                id: self.id.to_string(),
            });
        }

        if claimed_offset != self.offset {
            return Err(crate::TuskError::OffsetMismatch {
                expected: self.offset,
                actual: claimed_offset,
            });
        }

        let new_offset = self.offset + chunk_len;
        if new_offset > self.total_length {
            return Err(crate::TuskError::LengthExceeded {
                offset: claimed_offset,
                chunk: chunk_len,
                length: self.total_length,
            });
        }

        Ok(new_offset)
    }
}

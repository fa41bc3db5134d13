//! Error types for tusk

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TuskError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid upload id: {0}")]
    InvalidUploadId(String),

    #[error("Upload not found: {id}")]
    UploadNotFound { id: String },

    #[error("Offset mismatch: expected {expected}, got {actual}")]
    OffsetMismatch { expected: u64, actual: u64 },

    #[error("Upload {id} is already complete")]
    UploadComplete { id: String },

    #[error("Chunk of {chunk} bytes at offset {offset} exceeds upload length {length}")]
    LengthExceeded { offset: u64, chunk: u64, length: u64 },

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("Unsupported checksum algorithm: {0}")]
    UnsupportedChecksum(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

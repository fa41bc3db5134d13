//! Protocol-level failures and their status codes

use thiserror::Error;
use tusk_core::*;

/// Every way a request can be rejected. Each variant maps to exactly one
/// status code, so no failure leaves `handle_request` unmapped.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Unsupported Tus-Resumable version: {0:?}")]
    VersionMismatch(Option<String>),

    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    #[error("Invalid {name} header: {value:?}")]
    InvalidHeader { name: &'static str, value: String },

    #[error("Deferred upload length is not supported")]
    DeferredLength,

    #[error("Invalid Content-Type: {0:?}")]
    InvalidContentType(Option<String>),

    #[error("Invalid Upload-Metadata: {0}")]
    InvalidMetadata(String),

    #[error("Invalid Upload-Checksum: {0}")]
    InvalidChecksum(String),

    #[error("Not found: {0}")]
    RouteNotFound(String),

    #[error("Upload not found: {0}")]
    UploadNotFound(String),

    #[error("Method {method} not allowed on {path}")]
    MethodNotAllowed {
        method: String,
        path: String,
        allow: &'static str,
    },

    #[error("Upload-Offset mismatch: expected {expected}, got {actual}")]
    OffsetConflict { expected: u64, actual: u64 },

    #[error("Upload {0} is already complete")]
    AlreadyComplete(String),

    #[error("Upload size {size} exceeds maximum {max}")]
    UploadTooLarge { size: u64, max: u64 },

    #[error("Chunk of {chunk} bytes at offset {offset} exceeds upload length {length}")]
    ChunkTooLarge { offset: u64, chunk: u64, length: u64 },

    #[error("Checksum mismatch")]
    ChecksumMismatch,

    #[error("Storage error: {0}")]
    Storage(TuskError),
}

impl ProtocolError {
    pub fn status(&self) -> u16 {
        match self {
            ProtocolError::VersionMismatch(_) => 412,
            ProtocolError::MissingHeader(_)
            | ProtocolError::InvalidHeader { .. }
            | ProtocolError::DeferredLength
            | ProtocolError::InvalidContentType(_)
            | ProtocolError::InvalidMetadata(_)
            | ProtocolError::InvalidChecksum(_) => 400,
            ProtocolError::RouteNotFound(_) | ProtocolError::UploadNotFound(_) => 404,
            ProtocolError::MethodNotAllowed { .. } => 405,
            ProtocolError::OffsetConflict { .. } | ProtocolError::AlreadyComplete(_) => 409,
            ProtocolError::UploadTooLarge { .. } | ProtocolError::ChunkTooLarge { .. } => 413,
            ProtocolError::ChecksumMismatch => STATUS_CHECKSUM_MISMATCH,
            ProtocolError::Storage(_) => 500,
        }
    }

    /// Response for this failure; the version header is always present
    pub fn into_response(self) -> TusResponse {
        let mut response = TusResponse::new(self.status());

        match &self {
            ProtocolError::VersionMismatch(_) => {
                response.headers.insert(header::TUS_VERSION, TUS_VERSION);
            }
            ProtocolError::MethodNotAllowed { allow, .. } => {
                response.headers.insert(header::ALLOW, *allow);
            }
            _ => {}
        }

        // Storage internals stay out of the response body
        let message = match &self {
            ProtocolError::Storage(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        response.body(message)
    }
}

impl From<TuskError> for ProtocolError {
    fn from(err: TuskError) -> Self {
        match err {
            TuskError::UploadNotFound { id } => ProtocolError::UploadNotFound(id),
            TuskError::InvalidUploadId(id) => ProtocolError::UploadNotFound(id),
            TuskError::OffsetMismatch { expected, actual } => {
                ProtocolError::OffsetConflict { expected, actual }
            }
            TuskError::UploadComplete { id } => ProtocolError::AlreadyComplete(id),
            TuskError::LengthExceeded {
                offset,
                chunk,
                length,
            } => ProtocolError::ChunkTooLarge {
                offset,
                chunk,
                length,
            },
            TuskError::InvalidMetadata(msg) => ProtocolError::InvalidMetadata(msg),
            TuskError::UnsupportedChecksum(msg) => ProtocolError::InvalidChecksum(msg),
            other => ProtocolError::Storage(other),
        }
    }
}

pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

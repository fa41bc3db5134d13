//! Client error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The exchange never produced a response: refused connection, timeout,
    /// DNS failure, broken stream
    #[error("Communication error: {0}")]
    Communication(String),

    /// Terminal rejection, or retries exhausted
    #[error("Upload failed{}: {message}", .status.map(|s| format!(" with status {}", s)).unwrap_or_default())]
    UploadFailed { status: Option<u16>, message: String },

    #[error("Offset conflict at {offset}: server reports {server_offset}")]
    Conflict { offset: u64, server_offset: u64 },

    #[error("Checksum mismatch at offset {offset} after {attempts} attempts")]
    ChecksumMismatch { offset: u64, attempts: u32 },

    #[error("Invalid upload source: {0}")]
    InvalidSource(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid server response: {0}")]
    InvalidResponse(String),

    #[error("URL store error: {0}")]
    UrlStore(String),

    #[error("Core error: {0}")]
    Core(#[from] tusk_core::TuskError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Build an `UploadFailed` from a rejecting response
    pub fn from_response(response: &tusk_core::TusResponse) -> Self {
        let body = response.body_text();
        let message = if body.is_empty() {
            format!("server responded {}", response.status)
        } else {
            body
        };

        ClientError::UploadFailed {
            status: Some(response.status),
            message,
        }
    }

    /// Whether a retry of the same exchange may succeed
    pub fn is_retriable(&self) -> bool {
        match self {
            ClientError::Communication(_) => true,
            ClientError::UploadFailed {
                status: Some(status),
                ..
            } => is_retriable_status(*status),
            _ => false,
        }
    }

    /// Status code carried by the failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::UploadFailed { status, .. } => *status,
            _ => None,
        }
    }
}

/// Server statuses worth another attempt after a backoff
pub fn is_retriable_status(status: u16) -> bool {
    matches!(status, 423 | 429 | 500 | 502 | 503 | 504)
}

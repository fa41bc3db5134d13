//! Server configuration

use tusk_core::checksum::DEFAULT_ALGORITHM;
use tusk_core::{ChecksumRegistry, TuskError};

/// Protocol-level settings for a [`crate::TusServer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Path prefix uploads live under, without a trailing slash
    pub base_path: String,
    /// Largest accepted `Upload-Length`; `None` means unlimited
    pub max_size: Option<u64>,
    /// The one digest accepted in `Upload-Checksum`; `None` turns the
    /// checksum extension off
    pub checksum_algorithm: Option<String>,
}

impl ServerConfig {
    pub fn new(base_path: &str) -> Self {
        ServerConfig {
            base_path: normalize_base_path(base_path),
            ..Self::default()
        }
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        // Zero is treated as "no limit"
        self.max_size = (max_size > 0).then_some(max_size);
        self
    }

    pub fn with_checksum_algorithm(mut self, algorithm: Option<&str>) -> Self {
        self.checksum_algorithm = algorithm.map(|a| a.to_ascii_lowercase());
        self
    }

    /// Reject a checksum algorithm `checksums` cannot compute
    pub fn validate(&self, checksums: &ChecksumRegistry) -> tusk_core::Result<()> {
        match &self.checksum_algorithm {
            Some(name) if !checksums.contains(name) => Err(TuskError::UnsupportedChecksum(format!(
                "{} (available: {})",
                name,
                checksums.names().join(", ")
            ))),
            _ => Ok(()),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            base_path: "/files".to_string(),
            max_size: None,
            checksum_algorithm: Some(DEFAULT_ALGORITHM.to_string()),
        }
    }
}

/// Leading slash, no trailing slash; the root prefix becomes ""
fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

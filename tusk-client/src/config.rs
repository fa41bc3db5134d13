//! Client configuration

use std::time::Duration;
use tusk_core::checksum::DEFAULT_ALGORITHM;
use tusk_core::ChecksumRegistry;
use crate::{ClientError, Result};

/// Default chunk size, 1 MiB
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// Settings for the upload engine
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bytes per PATCH; the final chunk may be shorter
    pub chunk_size: u64,
    /// Digest attached to each chunk, `None` to send no checksum
    pub checksum_algorithm: Option<String>,
    /// HEAD resyncs allowed per chunk after a 409
    pub max_conflict_resyncs: u32,
    /// Resends allowed per chunk after a 460
    pub max_checksum_retries: u32,
    /// Per-exchange timeout, applied by the transport
    pub timeout: Duration,
    /// Verify TLS certificates on `https` endpoints
    pub verify_tls: bool,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_checksum(mut self, algorithm: Option<&str>) -> Self {
        self.checksum_algorithm = algorithm.map(|a| a.to_ascii_lowercase());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_verify_tls(mut self, verify_tls: bool) -> Self {
        self.verify_tls = verify_tls;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size < 1 {
            return Err(ClientError::InvalidConfig(
                "chunk size must be at least 1 byte".to_string(),
            ));
        }
        if let Some(algorithm) = &self.checksum_algorithm {
            if !ChecksumRegistry::default().contains(algorithm) {
                return Err(ClientError::InvalidConfig(format!(
                    "unknown checksum algorithm '{}'",
                    algorithm
                )));
            }
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            checksum_algorithm: Some(DEFAULT_ALGORITHM.to_string()),
            max_conflict_resyncs: 1,
            max_checksum_retries: 3,
            timeout: Duration::from_secs(30),
            verify_tls: true,
        }
    }
}

/// Backoff for the retrying chunk sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt of a chunk
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        RetryPolicy {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// `min(base * 2^(attempt-1), max)` for a 1-based attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exp)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn props_backoff_is_monotonic_and_capped(
            base_ms in 1u64..5_000,
            max_ms in 1u64..120_000,
            attempt in 1u32..64
        ) {
            let policy = RetryPolicy::new(3, Duration::from_millis(base_ms), Duration::from_millis(max_ms));
            let delay = policy.delay_for_attempt(attempt);
            prop_assert!(delay <= policy.max_delay);
            prop_assert!(delay >= policy.base_delay.min(policy.max_delay));
            prop_assert!(policy.delay_for_attempt(attempt + 1) >= delay);
        }
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(16));
        assert_eq!(policy.delay_for_attempt(6), Duration::from_secs(30));
        assert_eq!(policy.delay_for_attempt(60), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        assert!(ClientConfig::default().with_chunk_size(0).validate().is_err());
        assert!(ClientConfig::default().with_chunk_size(1).validate().is_ok());
    }

    #[test]
    fn test_unknown_checksum_is_rejected() {
        assert!(ClientConfig::default().with_checksum(Some("crc32")).validate().is_err());
        assert!(ClientConfig::default().with_checksum(Some("SHA256")).validate().is_ok());
        assert!(ClientConfig::default().with_checksum(None).validate().is_ok());
    }
}

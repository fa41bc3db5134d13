//! The single-chunk send step, and its retrying decorator

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};
use tusk_core::*;
use crate::config::RetryPolicy;
use crate::error::is_retriable_status;
use crate::transport::Transport;
use crate::{ClientError, Result};

/// Result of sending one chunk request
#[derive(Debug, Clone)]
pub struct SentChunk {
    pub response: TusResponse,
    /// Attempts made, 1 when the first one was answered
    pub attempts: u32,
}

impl SentChunk {
    pub fn retried(&self) -> bool {
        self.attempts > 1
    }
}

/// Sends one PATCH. Implementations may repeat the exchange but never send
/// two requests for the same upload concurrently.
#[async_trait]
pub trait ChunkSender: Send + Sync {
    async fn send_chunk(&self, request: &TusRequest) -> Result<SentChunk>;
}

/// One attempt, no retries
pub struct DirectSender {
    transport: Arc<dyn Transport>,
}

impl DirectSender {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        DirectSender { transport }
    }
}

#[async_trait]
impl ChunkSender for DirectSender {
    async fn send_chunk(&self, request: &TusRequest) -> Result<SentChunk> {
        let response = self.transport.send(request).await?;
        Ok(SentChunk {
            response,
            attempts: 1,
        })
    }
}

/// Retries communication failures and retriable statuses with exponential
/// backoff. The attempt counter starts over for every chunk.
pub struct RetryingSender<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: ChunkSender> RetryingSender<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        RetryingSender { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<S: ChunkSender> ChunkSender for RetryingSender<S> {
    async fn send_chunk(&self, request: &TusRequest) -> Result<SentChunk> {
        let max_attempts = self.policy.max_retries.saturating_add(1);
        let mut attempt = 1;

        loop {
            let failure = match self.inner.send_chunk(request).await {
                Ok(sent) if !is_retriable_status(sent.response.status) => {
                    if attempt > 1 {
                        info!(
                            "Chunk for {} went through after {} attempts",
                            request.target, attempt
                        );
                    }
                    return Ok(SentChunk {
                        response: sent.response,
                        attempts: attempt,
                    });
                }
                Ok(sent) => ClientError::from_response(&sent.response),
                Err(e) if e.is_retriable() => e,
                Err(e) => return Err(e),
            };

            if attempt >= max_attempts {
                warn!(
                    "Chunk for {} failed after {} attempts: {}",
                    request.target, attempt, failure
                );
                return Err(ClientError::UploadFailed {
                    status: failure.status(),
                    message: format!("gave up after {} attempts: {}", attempt, failure),
                });
            }

            let delay = self.policy.delay_for_attempt(attempt);
            warn!(
                "Chunk for {} failed (attempt {}/{}): {}. Retrying in {:?}",
                request.target, attempt, max_attempts, failure, delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl<S: ChunkSender + ?Sized> ChunkSender for Arc<S> {
    async fn send_chunk(&self, request: &TusRequest) -> Result<SentChunk> {
        (**self).send_chunk(request).await
    }
}

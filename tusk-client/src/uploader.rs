//! Per-upload state machine

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tusk_core::*;
use crate::config::ClientConfig;
use crate::progress::{ProgressSnapshot, ProgressTracker};
use crate::sender::ChunkSender;
use crate::session::Session;
use crate::source::OpenedSource;
use crate::url_store::UrlStore;
use crate::{ClientError, Result};

/// Called at every chunk boundary
pub type ProgressCallback = Box<dyn FnMut(&ProgressSnapshot) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    /// No location yet
    Unstarted,
    /// Location known, offset synced with the server
    Created,
    Uploading,
    Completed,
    /// Last step failed; the server keeps the last acknowledged offset
    Failed,
}

/// Drives one upload: creation or resume, then sequential chunks.
///
/// Exactly one chunk is in flight at a time; every method takes `&mut self`.
pub struct Uploader {
    session: Session,
    sender: Arc<dyn ChunkSender>,
    config: ClientConfig,
    checksums: ChecksumRegistry,
    source: OpenedSource,
    metadata: Metadata,
    url_store: Option<Arc<dyn UrlStore>>,
    url: Option<String>,
    offset: u64,
    state: UploadState,
    progress: ProgressTracker,
    on_progress: Option<ProgressCallback>,
}

impl Uploader {
    pub(crate) fn new(
        session: Session,
        sender: Arc<dyn ChunkSender>,
        config: ClientConfig,
        source: OpenedSource,
        metadata: Metadata,
        url_store: Option<Arc<dyn UrlStore>>,
        url: Option<String>,
    ) -> Self {
        let progress = ProgressTracker::new(source.len(), config.chunk_size);
        Uploader {
            session,
            sender,
            config,
            checksums: ChecksumRegistry::default(),
            source,
            metadata,
            url_store,
            url,
            offset: 0,
            state: UploadState::Unstarted,
            progress,
            on_progress: None,
        }
    }

    pub fn on_progress(mut self, callback: impl FnMut(&ProgressSnapshot) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn set_progress_callback(&mut self, callback: Option<ProgressCallback>) {
        self.on_progress = callback;
    }

    /// Upload URL, once created or resolved
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn total_length(&self) -> u64 {
        self.source.len()
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state != UploadState::Unstarted && self.offset >= self.source.len()
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot(self.offset)
    }

    /// Resolve the upload location and sync the offset; a no-op once done
    pub async fn start(&mut self) -> Result<()> {
        match self.state {
            UploadState::Unstarted => {
                let result = self.establish().await;
                self.settle(result)
            }
            UploadState::Failed => {
                let result = self.resync().await;
                self.settle(result)
            }
            _ => Ok(()),
        }
    }

    /// Send one chunk. Returns whether bytes remain.
    pub async fn upload_chunk(&mut self) -> Result<bool> {
        let total = self.source.len();
        self.step(total).await?;
        Ok(self.offset < total)
    }

    /// Send chunks until `stop_at` (or the end) and return the upload URL.
    ///
    /// With `stop_at` the upload is left partial; a later call continues it.
    pub async fn upload(&mut self, stop_at: Option<u64>) -> Result<String> {
        let total = self.source.len();
        let limit = stop_at.map_or(total, |s| s.min(total));

        self.start().await?;
        while self.offset < limit {
            self.step(limit).await?;
        }

        if self.offset >= total {
            info!(
                "Upload {} complete ({} bytes)",
                self.url.as_deref().unwrap_or_default(),
                total
            );
        }
        self.location()
    }

    fn location(&self) -> Result<String> {
        self.url
            .clone()
            .ok_or_else(|| ClientError::InvalidResponse("upload has no location".to_string()))
    }

    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.state = if self.offset >= self.source.len() {
                    UploadState::Completed
                } else if self.offset > 0 {
                    UploadState::Uploading
                } else {
                    UploadState::Created
                };
                Ok(value)
            }
            Err(e) => {
                self.state = UploadState::Failed;
                Err(e)
            }
        }
    }

    async fn step(&mut self, limit: u64) -> Result<()> {
        self.start().await?;
        if self.offset >= limit {
            return Ok(());
        }
        let result = self.send_next_chunk(limit).await;
        self.settle(result)
    }

    async fn establish(&mut self) -> Result<()> {
        if let Some(url) = self.url.clone() {
            let info = self.session.require_info(&url).await?;
            return self.adopt(&url, info.offset, info.length);
        }

        let fingerprint = match &self.url_store {
            Some(_) => Some(self.source.fingerprint().await?),
            None => None,
        };

        if let (Some(store), Some(fingerprint)) = (self.url_store.clone(), &fingerprint) {
            if let Some(url) = store.lookup(fingerprint).await? {
                match self.session.info(&url).await? {
                    Some(info) if info.length.map_or(true, |l| l == self.source.len()) => {
                        info!("Resuming {} at offset {}", url, info.offset);
                        return self.adopt(&url, info.offset, info.length);
                    }
                    _ => {
                        debug!("Discarding stale upload URL {}", url);
                        store.remove(fingerprint).await?;
                    }
                }
            }
        }

        let url = self.session.create(self.source.len(), &self.metadata).await?;
        if let (Some(store), Some(fingerprint)) = (&self.url_store, &fingerprint) {
            store.record(fingerprint, &url).await?;
        }

        self.url = Some(url);
        self.offset = 0;
        Ok(())
    }

    fn adopt(&mut self, url: &str, offset: u64, length: Option<u64>) -> Result<()> {
        let total = self.source.len();
        if let Some(length) = length {
            if length != total {
                return Err(ClientError::InvalidSource(format!(
                    "source is {} bytes but {} expects {}",
                    total, url, length
                )));
            }
        }
        if offset > total {
            return Err(ClientError::InvalidResponse(format!(
                "server offset {} is past the end of a {} byte source",
                offset, total
            )));
        }

        self.url = Some(url.to_string());
        self.offset = offset;
        Ok(())
    }

    async fn resync(&mut self) -> Result<()> {
        let url = self.location()?;
        let info = self.session.require_info(&url).await?;
        self.adopt(&url, info.offset, info.length)
    }

    fn chunk_request(&self, url: &str, offset: u64, data: Bytes) -> Result<TusRequest> {
        let mut request = self
            .session
            .request(Method::Patch, url)
            .header(header::UPLOAD_OFFSET, offset.to_string())
            .header(header::CONTENT_TYPE, OFFSET_CONTENT_TYPE);

        if let Some(algorithm) = &self.config.checksum_algorithm {
            request = request.header(
                header::UPLOAD_CHECKSUM,
                self.checksums.header_value(algorithm, &data)?,
            );
        }

        Ok(request.body(data))
    }

    /// Move to `new_offset` and report the chunk boundary
    fn advance(&mut self, from: u64, new_offset: u64, retried: bool) {
        self.offset = new_offset;
        self.progress.record_chunk(new_offset - from, retried);

        let snapshot = self.progress.snapshot(self.offset);
        if let Some(callback) = self.on_progress.as_mut() {
            callback(&snapshot);
        }
    }

    /// Get one chunk past `offset`. Conflict and checksum budgets apply to
    /// this chunk only; a resync that finds the server already ahead counts
    /// as the chunk landing.
    async fn send_next_chunk(&mut self, limit: u64) -> Result<()> {
        let url = self.location()?;
        let mut resyncs = 0u32;
        let mut checksum_failures = 0u32;

        loop {
            let offset = self.offset;
            if offset >= limit {
                return Ok(());
            }

            let len = self.config.chunk_size.min(limit - offset);
            let data = self.source.read_chunk(offset, len).await?;
            let request = self.chunk_request(&url, offset, data)?;
            let sent = self.sender.send_chunk(&request).await?;

            match sent.response.status {
                200..=299 => {
                    let new_offset = sent.response.upload_offset().ok_or_else(|| {
                        ClientError::InvalidResponse("PATCH response lacks Upload-Offset".to_string())
                    })?;
                    if new_offset < offset || new_offset > self.source.len() {
                        return Err(ClientError::InvalidResponse(format!(
                            "server moved offset from {} to {}",
                            offset, new_offset
                        )));
                    }

                    debug!("Chunk {}+{} accepted, offset {}", offset, len, new_offset);
                    let retried = sent.retried() || resyncs > 0 || checksum_failures > 0;
                    self.advance(offset, new_offset, retried);
                    return Ok(());
                }
                409 => {
                    let server_offset = self
                        .session
                        .require_info(&url)
                        .await?
                        .offset
                        .min(self.source.len());

                    if server_offset > offset {
                        // The bytes landed but the acknowledgment did not
                        warn!(
                            "Offset conflict at {} for {}, server already at {}",
                            offset, url, server_offset
                        );
                        self.advance(offset, server_offset, true);
                        return Ok(());
                    }

                    if resyncs >= self.config.max_conflict_resyncs {
                        return Err(ClientError::Conflict {
                            offset,
                            server_offset,
                        });
                    }

                    warn!(
                        "Offset conflict at {} for {}, resending from {}",
                        offset, url, server_offset
                    );
                    resyncs += 1;
                    self.offset = server_offset;
                }
                STATUS_CHECKSUM_MISMATCH => {
                    checksum_failures += 1;
                    if checksum_failures > self.config.max_checksum_retries {
                        return Err(ClientError::ChecksumMismatch {
                            offset,
                            attempts: checksum_failures,
                        });
                    }
                    warn!("Checksum mismatch at {} for {}, resending", offset, url);
                }
                _ => return Err(ClientError::from_response(&sent.response)),
            }
        }
    }
}

impl std::fmt::Debug for Uploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uploader")
            .field("url", &self.url)
            .field("offset", &self.offset)
            .field("total", &self.source.len())
            .field("state", &self.state)
            .finish()
    }
}

//! TUS request state machine

use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tusk_core::*;
use tusk_engine::UploadStore;
use crate::config::ServerConfig;
use crate::error::{ProtocolError, ProtocolResult};

const COLLECTION_METHODS: &str = "OPTIONS, POST";
const UPLOAD_METHODS: &str = "OPTIONS, HEAD, PATCH, DELETE";
const CHECKSUM_EXTENSION: &str = "checksum";

/// What a request path points at
#[derive(Debug, PartialEq, Eq)]
enum Route {
    Collection,
    Upload(UploadId),
}

/// Stateless protocol server over an [`UploadStore`].
///
/// `handle_request` is the whole transport contract: method, path, headers
/// and body in; status, headers and body out. The server keeps no state of
/// its own between calls, so it is safe to share across threads; same-id
/// concurrency is settled by the store's `append`.
pub struct TusServer {
    store: Arc<dyn UploadStore>,
    config: ServerConfig,
    checksums: ChecksumRegistry,
}

impl TusServer {
    pub fn new(store: Arc<dyn UploadStore>, config: ServerConfig) -> Self {
        TusServer {
            store,
            config,
            checksums: ChecksumRegistry::default(),
        }
        .checked()
    }

    /// Replace the digest functions the configured algorithm is looked up in
    pub fn with_checksums(mut self, checksums: ChecksumRegistry) -> Self {
        self.checksums = checksums;
        self.checked()
    }

    fn checked(self) -> Self {
        if let Err(e) = self.config.validate(&self.checksums) {
            warn!("Checksum extension disabled: {}", e);
        }
        self
    }

    /// Algorithm `Upload-Checksum` must use; `None` when the extension is off
    pub fn checksum_algorithm(&self) -> Option<&str> {
        self.config
            .checksum_algorithm
            .as_deref()
            .filter(|name| self.checksums.contains(name))
    }

    pub fn store(&self) -> &Arc<dyn UploadStore> {
        &self.store
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handle one request. Never fails: every error becomes a response.
    pub fn handle_request(
        &self,
        method: &str,
        path: &str,
        headers: &Headers,
        body: &[u8],
    ) -> TusResponse {
        debug!("Handling {} {} ({} body bytes)", method, path, body.len());

        match self.dispatch(method, path, headers, body) {
            Ok(response) => {
                debug!("{} {} -> {}", method, path, response.status);
                response
            }
            Err(ProtocolError::Storage(e)) => {
                error!("Storage failure for {} {}: {}", method, path, e);
                ProtocolError::Storage(e).into_response()
            }
            Err(e) => {
                warn!("{} {} rejected with {}: {}", method, path, e.status(), e);
                e.into_response()
            }
        }
    }

    /// Convenience wrapper over [`TusServer::handle_request`]
    pub fn handle(&self, request: &TusRequest) -> TusResponse {
        self.handle_request(
            request.method.as_str(),
            &request.target,
            &request.headers,
            &request.body,
        )
    }

    fn dispatch(
        &self,
        method: &str,
        path: &str,
        headers: &Headers,
        body: &[u8],
    ) -> ProtocolResult<TusResponse> {
        let parsed = Method::parse(method);

        if parsed != Some(Method::Options) {
            let version = headers.get(header::TUS_RESUMABLE);
            if version != Some(TUS_VERSION) {
                return Err(ProtocolError::VersionMismatch(version.map(str::to_string)));
            }
        }

        let route = self.route(path)?;

        match (parsed, route) {
            (Some(Method::Options), _) => Ok(self.handle_options()),
            (Some(Method::Post), Route::Collection) => self.handle_create(headers),
            (Some(Method::Head), Route::Upload(id)) => self.handle_head(&id),
            (Some(Method::Patch), Route::Upload(id)) => self.handle_patch(&id, headers, body),
            (Some(Method::Delete), Route::Upload(id)) => self.handle_delete(&id),
            (_, Route::Collection) => Err(ProtocolError::MethodNotAllowed {
                method: method.to_string(),
                path: path.to_string(),
                allow: COLLECTION_METHODS,
            }),
            (_, Route::Upload(_)) => Err(ProtocolError::MethodNotAllowed {
                method: method.to_string(),
                path: path.to_string(),
                allow: UPLOAD_METHODS,
            }),
        }
    }

    fn route(&self, path: &str) -> ProtocolResult<Route> {
        let not_found = || ProtocolError::RouteNotFound(path.to_string());

        let rest = path
            .strip_prefix(self.config.base_path.as_str())
            .ok_or_else(not_found)?;

        if rest.is_empty() || rest == "/" {
            return Ok(Route::Collection);
        }

        let id = rest.strip_prefix('/').ok_or_else(not_found)?;
        let id = UploadId::new(id).map_err(|_| not_found())?;
        Ok(Route::Upload(id))
    }

    fn handle_options(&self) -> TusResponse {
        let algorithm = self.checksum_algorithm();
        let extensions: Vec<&str> = TUS_EXTENSIONS
            .iter()
            .copied()
            .filter(|ext| *ext != CHECKSUM_EXTENSION || algorithm.is_some())
            .collect();

        let mut response = TusResponse::new(204)
            .header(header::TUS_VERSION, TUS_VERSION)
            .header(header::TUS_EXTENSION, extensions.join(","));

        if let Some(algorithm) = algorithm {
            response.headers.insert(header::TUS_CHECKSUM_ALGORITHM, algorithm);
        }

        if let Some(max_size) = self.config.max_size {
            response.headers.insert(header::TUS_MAX_SIZE, max_size.to_string());
        }

        response
    }

    fn handle_create(&self, headers: &Headers) -> ProtocolResult<TusResponse> {
        if headers.contains(header::UPLOAD_DEFER_LENGTH) {
            return Err(ProtocolError::DeferredLength);
        }

        let raw_length = headers
            .get(header::UPLOAD_LENGTH)
            .ok_or(ProtocolError::MissingHeader(header::UPLOAD_LENGTH))?;
        let length = parse_positive(raw_length).ok_or_else(|| ProtocolError::InvalidHeader {
            name: header::UPLOAD_LENGTH,
            value: raw_length.to_string(),
        })?;

        if let Some(max) = self.config.max_size {
            if length > max {
                return Err(ProtocolError::UploadTooLarge { size: length, max });
            }
        }

        let metadata = match headers.get(header::UPLOAD_METADATA) {
            Some(value) => Metadata::parse_header(value)?,
            None => Metadata::new(),
        };

        let id = self
            .store
            .create(length, metadata, self.checksum_algorithm())?;

        info!("Created upload {} ({} bytes)", id, length);

        Ok(TusResponse::new(201)
            .header(header::LOCATION, format!("{}/{}", self.config.base_path, id))
            .header(header::UPLOAD_OFFSET, "0"))
    }

    fn handle_head(&self, id: &UploadId) -> ProtocolResult<TusResponse> {
        let record = self.find(id)?;

        let mut response = TusResponse::new(200)
            .header(header::UPLOAD_OFFSET, record.offset.to_string())
            .header(header::UPLOAD_LENGTH, record.total_length.to_string())
            .header(header::CACHE_CONTROL, "no-store");

        if let Some(metadata) = record.metadata.to_header() {
            response.headers.insert(header::UPLOAD_METADATA, metadata);
        }

        Ok(response)
    }

    fn handle_patch(
        &self,
        id: &UploadId,
        headers: &Headers,
        body: &[u8],
    ) -> ProtocolResult<TusResponse> {
        let record = self.find(id)?;

        let content_type = headers.get(header::CONTENT_TYPE);
        let media_type = content_type.map(|ct| ct.split(';').next().unwrap_or("").trim());
        if media_type != Some(OFFSET_CONTENT_TYPE) {
            return Err(ProtocolError::InvalidContentType(content_type.map(str::to_string)));
        }

        let raw_offset = headers
            .get(header::UPLOAD_OFFSET)
            .ok_or(ProtocolError::MissingHeader(header::UPLOAD_OFFSET))?;
        let claimed = raw_offset
            .trim()
            .parse::<u64>()
            .map_err(|_| ProtocolError::InvalidHeader {
                name: header::UPLOAD_OFFSET,
                value: raw_offset.to_string(),
            })?;

        // Conflicts are reported before any digest work; the store repeats
        // this check atomically when the bytes are applied.
        record.check_append(claimed, body.len() as u64)?;

        if let Some(value) = headers.get(header::UPLOAD_CHECKSUM) {
            self.verify_checksum(value, body)?;
        }

        let new_offset = self.store.append(id, claimed, body)?;

        if new_offset == record.total_length && body.len() as u64 > 0 {
            info!("Upload {} complete ({} bytes)", id, new_offset);
        } else {
            debug!(
                "Upload {}: wrote {} bytes, offset {}/{}",
                id,
                body.len(),
                new_offset,
                record.total_length
            );
        }

        Ok(TusResponse::new(200).header(header::UPLOAD_OFFSET, new_offset.to_string()))
    }

    fn handle_delete(&self, id: &UploadId) -> ProtocolResult<TusResponse> {
        if !self.store.delete(id)? {
            return Err(ProtocolError::UploadNotFound(id.to_string()));
        }

        info!("Terminated upload {}", id);
        Ok(TusResponse::new(204))
    }

    fn verify_checksum(&self, value: &str, body: &[u8]) -> ProtocolResult<()> {
        let (algorithm, expected) = checksum::parse_header(value)?;

        match self.checksum_algorithm() {
            Some(accepted) if accepted == algorithm => {}
            Some(accepted) => {
                return Err(ProtocolError::InvalidChecksum(format!(
                    "algorithm {} is not accepted, use {}",
                    algorithm, accepted
                )))
            }
            None => {
                return Err(ProtocolError::InvalidChecksum(
                    "checksum extension is disabled".to_string(),
                ))
            }
        }

        if self.checksums.digest(&algorithm, body)? != expected {
            return Err(ProtocolError::ChecksumMismatch);
        }
        Ok(())
    }

    fn find(&self, id: &UploadId) -> ProtocolResult<UploadRecord> {
        self.store
            .get(id)?
            .ok_or_else(|| ProtocolError::UploadNotFound(id.to_string()))
    }
}

fn parse_positive(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().filter(|n| *n > 0)
}

//! Non-chunk exchanges: discovery, creation, status and termination

use std::sync::Arc;
use tracing::debug;
use tusk_core::*;
use crate::transport::Transport;
use crate::{ClientError, Result};

/// What an OPTIONS exchange advertised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub tus_resumable: Option<String>,
    pub versions: Vec<String>,
    pub extensions: Vec<String>,
    pub max_size: Option<u64>,
    pub checksum_algorithms: Vec<String>,
}

impl ServerInfo {
    pub fn supports_extension(&self, name: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(name))
    }
}

/// What a HEAD exchange reported for one upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadInfo {
    pub offset: u64,
    pub length: Option<u64>,
    pub metadata: Metadata,
}

impl UploadInfo {
    pub fn is_complete(&self) -> bool {
        self.length.is_some_and(|length| self.offset >= length)
    }
}

/// Endpoint, transport and the caller's extra headers
#[derive(Clone)]
pub(crate) struct Session {
    pub(crate) endpoint: String,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) headers: Headers,
}

impl Session {
    /// Request with the caller's headers underneath the protocol ones
    pub(crate) fn request(&self, method: Method, url: &str) -> TusRequest {
        let mut request = TusRequest::new(method, url);
        let mut headers = self.headers.clone();
        headers.extend(&request.headers);
        request.headers = headers;
        request
    }

    pub(crate) async fn server_info(&self) -> Result<ServerInfo> {
        let response = self
            .transport
            .send(&self.request(Method::Options, &self.endpoint))
            .await?;

        if !response.is_success() {
            return Err(ClientError::from_response(&response));
        }

        let list = |name: &str| -> Vec<String> {
            response
                .headers
                .get(name)
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };

        Ok(ServerInfo {
            tus_resumable: response.headers.get(header::TUS_RESUMABLE).map(str::to_string),
            versions: list(header::TUS_VERSION),
            extensions: list(header::TUS_EXTENSION),
            max_size: response.headers.get_u64(header::TUS_MAX_SIZE),
            checksum_algorithms: list(header::TUS_CHECKSUM_ALGORITHM),
        })
    }

    /// POST a new upload and return its absolute URL
    pub(crate) async fn create(&self, length: u64, metadata: &Metadata) -> Result<String> {
        let mut request = self
            .request(Method::Post, &self.endpoint)
            .header(header::UPLOAD_LENGTH, length.to_string());
        if let Some(encoded) = metadata.to_header() {
            request = request.header(header::UPLOAD_METADATA, encoded);
        }

        let response = self.transport.send(&request).await?;
        if response.status != 201 {
            return Err(ClientError::from_response(&response));
        }

        let location = response
            .headers
            .get(header::LOCATION)
            .ok_or_else(|| ClientError::InvalidResponse("creation response lacks Location".to_string()))?;

        let url = resolve_location(&self.endpoint, location);
        debug!("Created upload {} ({} bytes)", url, length);
        Ok(url)
    }

    /// HEAD the upload; `Ok(None)` when the server does not know it
    pub(crate) async fn info(&self, url: &str) -> Result<Option<UploadInfo>> {
        let response = self.transport.send(&self.request(Method::Head, url)).await?;

        match response.status {
            404 | 410 => Ok(None),
            status if (200..300).contains(&status) => {
                let offset = response.upload_offset().ok_or_else(|| {
                    ClientError::InvalidResponse("status response lacks Upload-Offset".to_string())
                })?;

                let metadata = match response.headers.get(header::UPLOAD_METADATA) {
                    Some(value) => Metadata::parse_header(value)?,
                    None => Metadata::new(),
                };

                Ok(Some(UploadInfo {
                    offset,
                    length: response.headers.get_u64(header::UPLOAD_LENGTH),
                    metadata,
                }))
            }
            _ => Err(ClientError::from_response(&response)),
        }
    }

    /// HEAD the upload, treating an unknown upload as a failure
    pub(crate) async fn require_info(&self, url: &str) -> Result<UploadInfo> {
        self.info(url).await?.ok_or_else(|| ClientError::UploadFailed {
            status: Some(404),
            message: format!("upload {} not found", url),
        })
    }

    /// DELETE the upload; an unknown upload counts as already removed
    pub(crate) async fn terminate(&self, url: &str) -> Result<()> {
        let response = self.transport.send(&self.request(Method::Delete, url)).await?;
        match response.status {
            404 | 410 => Ok(()),
            status if (200..300).contains(&status) => Ok(()),
            _ => Err(ClientError::from_response(&response)),
        }
    }
}

/// Resolve a `Location` header against the endpoint it came from
pub fn resolve_location(endpoint: &str, location: &str) -> String {
    if location.contains("://") {
        return location.to_string();
    }

    if let Some(path) = location.strip_prefix('/') {
        return match endpoint.find("://") {
            Some(scheme_end) => {
                let authority_start = scheme_end + 3;
                let authority_end = endpoint[authority_start..]
                    .find('/')
                    .map_or(endpoint.len(), |i| authority_start + i);
                format!("{}/{}", &endpoint[..authority_end], path)
            }
            None => location.to_string(),
        };
    }

    format!("{}/{}", endpoint.trim_end_matches('/'), location)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_location() {
        let endpoint = "http://host:1080/files";
        assert_eq!(
            resolve_location(endpoint, "http://other/files/a"),
            "http://other/files/a"
        );
        assert_eq!(
            resolve_location(endpoint, "/files/abc"),
            "http://host:1080/files/abc"
        );
        assert_eq!(
            resolve_location("http://host:1080", "/files/abc"),
            "http://host:1080/files/abc"
        );
        assert_eq!(
            resolve_location("http://host/files/", "abc"),
            "http://host/files/abc"
        );
        assert_eq!(resolve_location("/files", "/files/abc"), "/files/abc");
    }

    #[test]
    fn test_upload_info_completion() {
        let info = UploadInfo {
            offset: 10,
            length: Some(10),
            metadata: Metadata::new(),
        };
        assert!(info.is_complete());
        assert!(!UploadInfo { length: None, ..info }.is_complete());
    }
}

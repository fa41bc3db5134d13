//! Main client implementation

use std::sync::Arc;
use tracing::{debug, info};
use tusk_core::*;
use crate::config::{ClientConfig, RetryPolicy};
use crate::progress::ProgressSnapshot;
use crate::sender::{ChunkSender, DirectSender, RetryingSender};
use crate::session::{ServerInfo, Session, UploadInfo};
use crate::source::UploadSource;
use crate::transport::{HttpTransport, Transport};
use crate::uploader::Uploader;
use crate::url_store::UrlStore;
use crate::{ClientError, Result};

/// TUS client for one creation endpoint
pub struct TusClient {
    session: Session,
    sender: Arc<dyn ChunkSender>,
    config: ClientConfig,
    url_store: Option<Arc<dyn UrlStore>>,
}

impl TusClient {
    /// Client over any transport, sending each chunk once
    pub fn new(
        endpoint: impl Into<String>,
        transport: Arc<dyn Transport>,
        config: ClientConfig,
    ) -> Result<Self> {
        config.validate()?;

        let endpoint = endpoint.into();
        if endpoint.is_empty() {
            return Err(ClientError::InvalidConfig("empty endpoint".to_string()));
        }

        Ok(TusClient {
            sender: Arc::new(DirectSender::new(transport.clone())),
            session: Session {
                endpoint,
                transport,
                headers: Headers::new(),
            },
            config,
            url_store: None,
        })
    }

    /// Client speaking HTTP to `endpoint`
    pub fn http(endpoint: impl Into<String>, config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.timeout).with_verify_tls(config.verify_tls);
        Self::new(endpoint, Arc::new(transport), config)
    }

    /// Retry chunk sends with backoff
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        let direct = DirectSender::new(self.session.transport.clone());
        self.sender = Arc::new(RetryingSender::new(direct, policy));
        self
    }

    /// Replace the chunk-send step
    pub fn with_sender(mut self, sender: Arc<dyn ChunkSender>) -> Self {
        self.sender = sender;
        self
    }

    /// Remember upload URLs by source fingerprint, enabling cross-session resume
    pub fn with_url_store(mut self, store: Arc<dyn UrlStore>) -> Self {
        self.url_store = Some(store);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.session.endpoint
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Merge extra headers sent with every exchange
    pub fn update_headers(&mut self, headers: &Headers) {
        self.session.headers.extend(headers);
    }

    /// Extra headers sent with every exchange
    pub fn headers(&self) -> &Headers {
        &self.session.headers
    }

    /// Version, extensions and limits advertised by the server
    pub async fn server_info(&self) -> Result<ServerInfo> {
        self.session.server_info().await
    }

    /// Uploader that creates (or, with a URL store, resumes) the upload on
    /// its first step
    pub async fn uploader(&self, source: UploadSource, mut metadata: Metadata) -> Result<Uploader> {
        let source = source.open().await?;
        if source.is_empty() {
            return Err(ClientError::InvalidSource(
                "empty sources cannot be uploaded".to_string(),
            ));
        }

        if !metadata.contains_key("filename") {
            if let Some(name) = source.filename() {
                metadata.insert("filename", name)?;
            }
        }

        Ok(Uploader::new(
            self.session.clone(),
            self.sender.clone(),
            self.config.clone(),
            source,
            metadata,
            self.url_store.clone(),
            None,
        ))
    }

    /// Uploader bound to an existing upload URL
    pub async fn uploader_at(&self, source: UploadSource, location: &str) -> Result<Uploader> {
        let source = source.open().await?;
        Ok(Uploader::new(
            self.session.clone(),
            self.sender.clone(),
            self.config.clone(),
            source,
            Metadata::new(),
            None,
            Some(location.to_string()),
        ))
    }

    /// Upload the whole source and return its URL
    pub async fn upload(&self, source: UploadSource, metadata: Metadata) -> Result<String> {
        let mut uploader = self.uploader(source, metadata).await?;
        uploader.upload(None).await
    }

    /// [`TusClient::upload`], reporting progress after every chunk
    pub async fn upload_with_progress(
        &self,
        source: UploadSource,
        metadata: Metadata,
        callback: impl FnMut(&ProgressSnapshot) + Send + 'static,
    ) -> Result<String> {
        let mut uploader = self.uploader(source, metadata).await?.on_progress(callback);
        uploader.upload(None).await
    }

    /// Continue the upload at `location` from the offset the server reports
    pub async fn resume(&self, source: UploadSource, location: &str) -> Result<String> {
        let mut uploader = self.uploader_at(source, location).await?;
        uploader.start().await?;
        info!("Resuming {} at offset {}", location, uploader.offset());
        uploader.upload(None).await
    }

    /// Current offset of the upload
    pub async fn status(&self, location: &str) -> Result<u64> {
        let offset = self.session.require_info(location).await?.offset;
        debug!("{} is at offset {}", location, offset);
        Ok(offset)
    }

    /// Offset, length and decoded metadata of the upload
    pub async fn upload_info(&self, location: &str) -> Result<UploadInfo> {
        self.session.require_info(location).await
    }

    /// Terminate the upload; an already removed upload is not an error
    pub async fn remove(&self, location: &str) -> Result<()> {
        self.session.terminate(location).await?;
        info!("Removed upload {}", location);
        Ok(())
    }
}

#[cfg(all(test, feature = "local"))]
mod tests {
    use super::*;
    use crate::local::LocalTransport;
    use tusk_engine::MemoryStore;
    use tusk_server::{ServerConfig, TusServer};

    fn client() -> TusClient {
        let server = TusServer::new(Arc::new(MemoryStore::new()), ServerConfig::default());
        TusClient::new(
            "http://local/files",
            Arc::new(LocalTransport::new(server)),
            ClientConfig::default().with_chunk_size(4),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_filename_metadata_is_added_for_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, b"jpegdata").unwrap();

        let client = client();
        let url = client.upload(UploadSource::path(&path), Metadata::new()).await.unwrap();

        let info = client.upload_info(&url).await.unwrap();
        assert_eq!(info.metadata.get_str("filename"), Some("photo.jpg"));
        assert!(info.is_complete());
    }

    #[tokio::test]
    async fn test_explicit_filename_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, b"jpegdata").unwrap();

        let mut metadata = Metadata::new();
        metadata.insert("filename", "renamed.jpg").unwrap();

        let client = client();
        let url = client.upload(UploadSource::path(&path), metadata).await.unwrap();
        let info = client.upload_info(&url).await.unwrap();
        assert_eq!(info.metadata.get_str("filename"), Some("renamed.jpg"));
    }

    #[tokio::test]
    async fn test_empty_source_is_rejected() {
        let err = client()
            .upload(UploadSource::bytes(Vec::new()), Metadata::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidSource(_)));
    }

    #[tokio::test]
    async fn test_custom_headers() {
        let mut client = client();
        client.update_headers(&Headers::new().with("X-Trace", "abc"));
        assert_eq!(client.headers().get("x-trace"), Some("abc"));

        // The local server ignores unknown headers
        let url = client
            .upload(UploadSource::bytes(&b"payload"[..]), Metadata::new())
            .await
            .unwrap();
        assert_eq!(client.status(&url).await.unwrap(), 7);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let server = TusServer::new(Arc::new(MemoryStore::new()), ServerConfig::default());
        let transport: Arc<dyn Transport> = Arc::new(LocalTransport::new(server));

        assert!(TusClient::new(
            "http://local/files",
            transport.clone(),
            ClientConfig::default().with_chunk_size(0)
        )
        .is_err());
        assert!(TusClient::new("", transport, ClientConfig::default()).is_err());
    }
}

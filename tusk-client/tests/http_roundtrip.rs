//! Client and server talking over a real socket

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tusk_client::{ClientConfig, ClientError, TusClient, UploadSource};
use tusk_core::test_utils::patterned_bytes;
use tusk_core::Metadata;
use tusk_engine::{FileStore, StorageEngine};
use tusk_server::{HttpServer, ServerConfig, TusServer};

async fn spawn_server(store: Arc<FileStore>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = TusServer::new(store, ServerConfig::default().with_max_size(1 << 20));

    tokio::spawn(HttpServer::new(server).serve_listener(listener));
    format!("http://{}/files", addr)
}

#[tokio::test]
async fn upload_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(StorageEngine::new(dir.path()).unwrap()).unwrap());
    let endpoint = spawn_server(store).await;

    let config = ClientConfig::default()
        .with_chunk_size(4096)
        .with_timeout(Duration::from_secs(5));
    let client = TusClient::http(&endpoint, config).unwrap();

    let info = client.server_info().await.unwrap();
    assert_eq!(info.tus_resumable.as_deref(), Some("1.0.0"));
    assert_eq!(info.max_size, Some(1 << 20));
    assert!(info.supports_extension("checksum"));

    let data = patterned_bytes(10_000);
    let mut metadata = Metadata::new();
    metadata.insert("filename", "data.bin").unwrap();

    let mut uploader = client
        .uploader(UploadSource::bytes(data.clone()), metadata)
        .await
        .unwrap();
    let url = uploader.upload(Some(4096)).await.unwrap();
    assert!(url.starts_with(&endpoint));
    assert_eq!(client.status(&url).await.unwrap(), 4096);

    uploader.upload(None).await.unwrap();
    let info = client.upload_info(&url).await.unwrap();
    assert_eq!(info.offset, 10_000);
    assert!(info.is_complete());
    assert_eq!(info.metadata.get_str("filename"), Some("data.bin"));

    client.remove(&url).await.unwrap();
    assert_eq!(
        client.status(&url).await.unwrap_err().status(),
        Some(404)
    );
}

#[tokio::test]
async fn unreachable_server_is_a_communication_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = TusClient::http(
        format!("http://{}/files", addr),
        ClientConfig::default().with_timeout(Duration::from_secs(2)),
    )
    .unwrap();

    let err = client
        .upload(UploadSource::bytes(patterned_bytes(16)), Metadata::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Communication(_)), "{}", err);
}

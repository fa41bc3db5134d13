//! In-process transport for embedding a server next to the client

use async_trait::async_trait;
use hyper::Uri;
use std::sync::Arc;
use tusk_core::*;
use tusk_server::TusServer;
use crate::transport::Transport;
use crate::{ClientError, Result};

/// Calls a [`TusServer`] directly, skipping the network
#[derive(Clone)]
pub struct LocalTransport {
    server: Arc<TusServer>,
}

impl LocalTransport {
    pub fn new(server: TusServer) -> Self {
        LocalTransport {
            server: Arc::new(server),
        }
    }

    pub fn from_shared(server: Arc<TusServer>) -> Self {
        LocalTransport { server }
    }

    pub fn server(&self) -> &Arc<TusServer> {
        &self.server
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn send(&self, request: &TusRequest) -> Result<TusResponse> {
        let path = match request.target.parse::<Uri>() {
            Ok(uri) => uri.path().to_string(),
            Err(_) => request.target.clone(),
        };

        let server = self.server.clone();
        let method = request.method;
        let headers = request.headers.clone();
        let body = request.body.clone();

        tokio::task::spawn_blocking(move || {
            server.handle_request(method.as_str(), &path, &headers, &body)
        })
        .await
        .map_err(|e| ClientError::Communication(format!("local server task failed: {}", e)))
    }
}

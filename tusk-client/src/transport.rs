//! Request transports

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Uri};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tracing::trace;
use tusk_core::*;
use crate::{ClientError, Result};

/// One request/response exchange.
///
/// Any failure to obtain a response is a `ClientError::Communication`;
/// non-2xx responses are returned as responses, not errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &TusRequest) -> Result<TusResponse>;
}

/// hyper-util HTTP/1.1 client
pub struct HttpTransport {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
    verify_tls: bool,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        HttpTransport {
            client,
            timeout,
            verify_tls: true,
        }
    }

    /// Certificate verification setting for `https` endpoints
    pub fn with_verify_tls(mut self, verify_tls: bool) -> Self {
        self.verify_tls = verify_tls;
        self
    }

    pub fn verify_tls(&self) -> bool {
        self.verify_tls
    }

    fn build(&self, request: &TusRequest) -> Result<Request<Full<Bytes>>> {
        let uri: Uri = request
            .target
            .parse()
            .map_err(|e| ClientError::InvalidConfig(format!("invalid URL {:?}: {}", request.target, e)))?;

        match uri.scheme_str() {
            Some("http") => {}
            Some("https") => {
                return Err(ClientError::InvalidConfig(format!(
                    "{} needs a TLS-capable transport (verify_tls={})",
                    request.target, self.verify_tls
                )))
            }
            _ => {
                return Err(ClientError::InvalidConfig(format!(
                    "URL {:?} must be absolute http",
                    request.target
                )))
            }
        }

        let mut builder = Request::builder().method(request.method.as_str()).uri(uri);
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }

        builder
            .body(Full::new(request.body.clone()))
            .map_err(|e| ClientError::InvalidConfig(format!("invalid request: {}", e)))
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &TusRequest) -> Result<TusResponse> {
        let http_request = self.build(request)?;
        trace!("{} {}", request.method, request.target);

        let exchange = async {
            let response = self
                .client
                .request(http_request)
                .await
                .map_err(|e| ClientError::Communication(e.to_string()))?;

            let status = response.status().as_u16();
            let headers: Headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();

            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| ClientError::Communication(e.to_string()))?
                .to_bytes();

            Ok::<_, ClientError>(TusResponse {
                status,
                headers,
                body,
            })
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                ClientError::Communication(format!(
                    "{} {} timed out after {:?}",
                    request.method, request.target, self.timeout
                ))
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_transport_rejects_relative_and_tls_urls() {
        let transport = HttpTransport::default();

        let request = TusRequest::new(Method::Options, "/files");
        assert!(matches!(transport.build(&request), Err(ClientError::InvalidConfig(_))));

        let request = TusRequest::new(Method::Options, "https://example.com/files");
        assert!(matches!(transport.build(&request), Err(ClientError::InvalidConfig(_))));
    }

    #[test]
    fn test_http_request_carries_headers_and_body() {
        let transport = HttpTransport::default();
        let request = TusRequest::new(Method::Patch, "http://127.0.0.1:1080/files/abc")
            .header(header::UPLOAD_OFFSET, "0")
            .body(&b"data"[..]);

        let built = transport.build(&request).unwrap();
        assert_eq!(built.method(), hyper::Method::PATCH);
        assert_eq!(built.headers()["upload-offset"], "0");
        assert_eq!(built.headers()["tus-resumable"], "1.0.0");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_communication_error() {
        let transport = HttpTransport::new(Duration::from_secs(2));
        // Port 9 (discard) is closed on any sane test host
        let request = TusRequest::new(Method::Options, "http://127.0.0.1:9/files");
        let err = transport.send(&request).await.unwrap_err();
        assert!(err.is_retriable(), "{}", err);
    }
}

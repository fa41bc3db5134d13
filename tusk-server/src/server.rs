//! HTTP/1.1 transport for [`TusServer`]

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderName, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};
use tusk_core::*;
use crate::handlers::TusServer;

/// Accept loop mapping hyper requests onto `TusServer::handle_request`
pub struct HttpServer {
    server: Arc<TusServer>,
}

impl HttpServer {
    pub fn new(server: TusServer) -> Self {
        HttpServer {
            server: Arc::new(server),
        }
    }

    /// Bind `addr` and serve until the task is dropped
    pub async fn serve(self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_listener(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve_listener(self, listener: TcpListener) -> std::io::Result<()> {
        info!(
            "tusk server listening on {} (uploads under {:?})",
            listener.local_addr()?,
            self.server.config().base_path
        );

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            debug!("New connection from {}", remote_addr);

            let server = self.server.clone();
            tokio::spawn(async move {
                Self::handle_connection(stream, remote_addr, server).await;
            });
        }
    }

    async fn handle_connection(stream: TcpStream, remote_addr: SocketAddr, server: Arc<TusServer>) {
        let io = TokioIo::new(stream);

        let service = service_fn(move |req| {
            let server = server.clone();
            async move { Ok::<_, Infallible>(dispatch(req, server).await) }
        });

        if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
            error!("HTTP connection error from {}: {}", remote_addr, err);
        }
    }
}

async fn dispatch(req: Request<Incoming>, server: Arc<TusServer>) -> Response<Full<Bytes>> {
    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();

    let headers: Headers = req
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Failed to read body for {} {}: {}", method, path, e);
            return into_hyper(TusResponse::new(400).body("Unreadable request body"));
        }
    };

    // Storage calls block on file I/O and per-upload locks
    let response = tokio::task::spawn_blocking(move || {
        server.handle_request(&method, &path, &headers, &body)
    })
    .await
    .unwrap_or_else(|e| {
        error!("Request handler panicked: {}", e);
        TusResponse::new(500).body("Internal server error")
    });

    into_hyper(response)
}

fn into_hyper(response: TusResponse) -> Response<Full<Bytes>> {
    let has_body = !response.body.is_empty();
    let mut out = Response::new(Full::new(response.body));
    *out.status_mut() =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let headers = out.headers_mut();
    for (name, value) in response.headers.iter() {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!("Dropping unrepresentable header {}: {:?}", name, value),
        }
    }

    if has_body && !headers.contains_key(hyper::header::CONTENT_TYPE) {
        headers.insert(
            hyper::header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonstandard_status_survives_conversion() {
        let response = into_hyper(TusResponse::new(460).body("Checksum mismatch"));
        assert_eq!(response.status().as_u16(), 460);
        assert_eq!(response.headers()["tus-resumable"], "1.0.0");
        assert_eq!(
            response.headers()[hyper::header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_empty_response_has_no_content_type() {
        let response = into_hyper(TusResponse::new(204));
        assert!(response.headers().get(hyper::header::CONTENT_TYPE).is_none());
    }
}

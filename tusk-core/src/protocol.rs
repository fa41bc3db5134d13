//! TUS 1.0.0 wire vocabulary and the transport-neutral exchange types
//!
//! https://tus.io/protocols/resumable-upload.html

use bytes::Bytes;

use crate::Headers;

/// The only protocol version spoken by this workspace
pub const TUS_VERSION: &str = "1.0.0";

/// Extensions advertised on OPTIONS
pub const TUS_EXTENSIONS: &[&str] = &["creation", "termination", "checksum"];

/// Content type every PATCH body must carry
pub const OFFSET_CONTENT_TYPE: &str = "application/offset+octet-stream";

/// Non-standard status used by the checksum extension
pub const STATUS_CHECKSUM_MISMATCH: u16 = 460;

pub mod header {
    pub const TUS_RESUMABLE: &str = "Tus-Resumable";
    pub const TUS_VERSION: &str = "Tus-Version";
    pub const TUS_EXTENSION: &str = "Tus-Extension";
    pub const TUS_MAX_SIZE: &str = "Tus-Max-Size";
    pub const TUS_CHECKSUM_ALGORITHM: &str = "Tus-Checksum-Algorithm";
    pub const UPLOAD_LENGTH: &str = "Upload-Length";
    pub const UPLOAD_DEFER_LENGTH: &str = "Upload-Defer-Length";
    pub const UPLOAD_OFFSET: &str = "Upload-Offset";
    pub const UPLOAD_METADATA: &str = "Upload-Metadata";
    pub const UPLOAD_CHECKSUM: &str = "Upload-Checksum";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const CONTENT_LENGTH: &str = "Content-Length";
    pub const CACHE_CONTROL: &str = "Cache-Control";
    pub const LOCATION: &str = "Location";
    pub const ALLOW: &str = "Allow";
}

/// Methods the protocol uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Options,
    Post,
    Head,
    Patch,
    Delete,
}

impl Method {
    /// Parse a method name, case-insensitively
    pub fn parse(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "OPTIONS" => Some(Method::Options),
            "POST" => Some(Method::Post),
            "HEAD" => Some(Method::Head),
            "PATCH" => Some(Method::Patch),
            "DELETE" => Some(Method::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Options => "OPTIONS",
            Method::Post => "POST",
            Method::Head => "HEAD",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical HTTP request, independent of any HTTP object model
#[derive(Debug, Clone)]
pub struct TusRequest {
    pub method: Method,
    /// Absolute URL on the client side, path on the server side
    pub target: String,
    pub headers: Headers,
    pub body: Bytes,
}

impl TusRequest {
    /// Request carrying the version header
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        TusRequest {
            method,
            target: target.into(),
            headers: Headers::new().with(header::TUS_RESUMABLE, TUS_VERSION),
            body: Bytes::new(),
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// One logical HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TusResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl TusResponse {
    /// Response carrying the version header
    pub fn new(status: u16) -> Self {
        TusResponse {
            status,
            headers: Headers::new().with(header::TUS_RESUMABLE, TUS_VERSION),
            body: Bytes::new(),
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `Upload-Offset` as reported by the server
    pub fn upload_offset(&self) -> Option<u64> {
        self.headers.get_u64(header::UPLOAD_OFFSET)
    }

    /// Body as lossy UTF-8, for error messages
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse() {
        assert_eq!(Method::parse("patch"), Some(Method::Patch));
        assert_eq!(Method::parse("OPTIONS"), Some(Method::Options));
        assert_eq!(Method::parse("GET"), None);
    }

    #[test]
    fn test_new_messages_carry_version() {
        let request = TusRequest::new(Method::Head, "/files/abc");
        assert_eq!(request.headers.get("tus-resumable"), Some(TUS_VERSION));

        let response = TusResponse::new(204);
        assert_eq!(response.headers.get("tus-resumable"), Some(TUS_VERSION));
        assert!(response.is_success());
    }
}

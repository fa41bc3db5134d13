//! tusk client: resumable uploads over the TUS 1.0.0 protocol
//!
//! Chunks are sent strictly one at a time per upload. The server's offset
//! is the only source of truth; on a conflict the client asks the server
//! where it stands and continues from there.

pub mod client;
pub mod config;
pub mod error;
pub mod fingerprint;
#[cfg(feature = "local")]
pub mod local;
pub mod progress;
pub mod sender;
pub mod session;
pub mod source;
pub mod transport;
pub mod uploader;
pub mod url_store;

pub use client::TusClient;
pub use config::{ClientConfig, RetryPolicy};
pub use error::ClientError;
pub use progress::ProgressSnapshot;
pub use sender::{ChunkSender, DirectSender, RetryingSender, SentChunk};
pub use session::{resolve_location, ServerInfo, UploadInfo};
pub use source::{OpenedSource, SourceReader, UploadSource};
pub use transport::{HttpTransport, Transport};
#[cfg(feature = "local")]
pub use local::LocalTransport;
pub use uploader::{ProgressCallback, UploadState, Uploader};
pub use url_store::{FileUrlStore, MemoryUrlStore, UrlStore};

pub type Result<T> = std::result::Result<T, ClientError>;

//! TUS 1.0.0 protocol server
//!
//! [`TusServer`] is a pure request handler over an upload store;
//! [`HttpServer`] puts it on a socket.

pub mod config;
pub mod error;
pub mod handlers;
pub mod server;

pub use config::ServerConfig;
pub use error::{ProtocolError, ProtocolResult};
pub use handlers::TusServer;
pub use server::HttpServer;

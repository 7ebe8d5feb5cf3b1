//! Error types for the development server core.
//!
//! Only listener-level failures and configuration mistakes surface as errors.
//! Protocol errors, debugger conflicts and delivery failures on individual
//! sockets are handled inside the channels and never reach callers.

use std::net::SocketAddr;
use thiserror::Error;

/// Errors returned by the server shell.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The HTTP listener could not be bound (port in use, permission denied, ...)
    #[error("Failed to bind to {addr}: {source}\n\nHint: Another process may already be using this port, try --port <PORT>")]
    Bind {
        /// Address the listener tried to bind
        addr: SocketAddr,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// The listener failed while serving connections
    #[error("Server error: {0}")]
    Serve(std::io::Error),

    /// Server configuration is inconsistent
    #[error("Invalid server configuration: {0}")]
    InvalidConfig(String),

    /// I/O errors from file system operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using `ServerError` as the default error type.
pub type Result<T, E = ServerError> = std::result::Result<T, E>;

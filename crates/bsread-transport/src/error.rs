use std::time::Duration;

use crate::config::Mode;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The address is not of the form `tcp://<host>:<port>`.
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Failed to bind to the specified address.
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking send did not complete within the configured timeout.
    #[error("send timed out after {0:?}")]
    SendTimeout(Duration),

    /// No message arrived within the configured receive timeout.
    #[error("receive timed out after {0:?}")]
    ReceiveTimeout(Duration),

    /// The byte stream did not contain well-formed multipart frames.
    #[error("malformed multipart stream: {0}")]
    Framing(String),

    /// The socket mode does not support the requested direction.
    #[error("{mode} socket cannot {operation}")]
    UnsupportedMode {
        mode: Mode,
        operation: &'static str,
    },

    /// The transport has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, TransportError>;

use std::time::Duration;

use bsread_transport::TransportError;

use crate::value::DataType;

/// Errors raised while converting channel values to or from raw bytes.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The value cannot be represented as the declared element type.
    #[error("cannot encode {found} value as {expected}")]
    TypeMismatch { expected: DataType, found: DataType },

    /// The number of elements does not match the declared shape.
    #[error("shape mismatch: declared {expected} elements, got {found}")]
    ShapeMismatch { expected: usize, found: usize },

    /// The shape describes more elements than fit in memory.
    #[error("shape {0:?} is too large")]
    ShapeOverflow(Vec<u32>),

    /// The raw byte length does not fit the declared type and shape.
    #[error("expected {expected} bytes, got {found}")]
    Length { expected: usize, found: usize },

    /// A string channel carried bytes that are not UTF-8.
    #[error("string value is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// The compression provider could not restore the payload.
    #[error("decompression failed ({compression}): {message}")]
    Decompression {
        compression: String,
        message: String,
    },
}

/// Errors surfaced by the bsread protocol core.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Invalid configuration: unknown compression, malformed metadata, ...
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Values passed to a send call do not fit the configured channels.
    #[error("validation error: {0}")]
    Validation(String),

    /// The transport failed to bind, connect or deliver.
    #[error("transport error: {0}")]
    Transport(TransportError),

    /// A blocking send did not complete in time. The message was not sent.
    #[error("send timed out after {0:?}")]
    SendTimeout(Duration),

    /// A channel value could not be encoded.
    #[error("channel '{channel}': {source}")]
    Codec {
        channel: String,
        #[source]
        source: CodecError,
    },

    /// Header (de)serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The pre-send hook failed; nothing was sent.
    #[error("pre-send hook failed: {0}")]
    Hook(#[source] HookError),

    /// The post-send hook failed after the message was sent.
    #[error("post-send hook failed after sending pulse {pulse_id}: {source}")]
    PostSendHook {
        pulse_id: u64,
        #[source]
        source: HookError,
    },

    /// The operation is not valid in the sender's current state.
    #[error("invalid sender state: {0}")]
    InvalidState(String),

    /// A received message could not be interpreted.
    #[error("malformed message: {0}")]
    Decode(String),
}

impl From<TransportError> for ProtocolError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::SendTimeout(timeout) => ProtocolError::SendTimeout(timeout),
            other => ProtocolError::Transport(other),
        }
    }
}

/// Error type returned by user hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, ProtocolError>;

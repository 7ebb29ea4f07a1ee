/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header contains an invalid magic number.
    #[error("invalid frame magic (expected 0x4253 \"BS\")")]
    InvalidMagic,

    /// The flag byte has bits set that this codec does not define.
    #[error("invalid frame flags 0x{0:02x}")]
    InvalidFlags(u8),

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A message must contain at least one frame.
    #[error("cannot frame an empty message")]
    EmptyMessage,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer did not accept or deliver bytes before the stream timeout.
    #[error("stream operation timed out")]
    Timeout,

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;

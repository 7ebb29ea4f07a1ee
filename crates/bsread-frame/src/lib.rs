//! Length-prefixed multipart framing over byte streams.
//!
//! A bsread message is a sequence of frames delivered as one unit. On a plain
//! byte stream every frame is prefixed with:
//! - A 2-byte magic number ("BS") for stream synchronization
//! - A 1-byte flag field (bit 0: more frames follow in this message)
//! - A 4-byte little-endian payload length
//!
//! Writers emit a whole message in one buffered write; readers only ever
//! hand out complete messages.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_part, encode_message, encode_part, FrameConfig, Part, DEFAULT_MAX_PAYLOAD, FLAG_MORE,
    HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::MessageReader;
pub use writer::MessageWriter;

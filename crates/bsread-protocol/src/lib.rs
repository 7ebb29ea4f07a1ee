//! The bsread protocol core.
//!
//! - [`value`]: channel values and their byte encoding
//! - [`compression`]: name-keyed compression providers
//! - [`channel`]: channel metadata and the ordered registry
//! - [`header`]: main and data headers
//! - [`message`]: frame assembly for one pulse
//! - [`sender`]: the locked send path with its pulse counter
//! - [`decode`], [`receiver`], [`consistency`]: the receiving side
//!
//! Transports are reached only through the `bsread-transport` traits.

pub mod channel;
pub mod compression;
pub mod config;
pub mod consistency;
pub mod decode;
pub mod error;
pub mod header;
pub mod message;
pub mod receiver;
pub mod sender;
pub mod value;

pub use channel::{value_source, Channel, ChannelMetadata, ChannelRegistry, ValueSource};
pub use compression::{CompressionProvider, CompressionRegistry, Identity};
pub use config::SenderConfig;
pub use consistency::{ConsistencyChecker, PulseTransition, Statistics};
pub use decode::{decode_message, ChannelData, ChannelValue, DecodedMessage, HeaderCache};
pub use error::{CodecError, HookError, ProtocolError, Result};
pub use header::{
    build_data_header, build_main_header, header_hash, DataHeader, EncodedDataHeader, MainHeader,
    Timestamp, DATA_HEADER_TYPE, MAIN_HEADER_TYPE,
};
pub use message::{assemble, frame_count, send_frames};
pub use receiver::Receiver;
pub use sender::{PostSendHook, PreSendHook, SendOptions, Sender, SenderState, Values};
pub use value::{Array, ArrayData, ByteOrder, DataType, Scalar, Value};

//! bsread: pulse-synchronous multi-channel data streaming.
//!
//! A sender multiplexes named channels into one multipart message per pulse:
//! a main header, a data header describing the channels, then a value frame
//! and a timestamp frame per channel. Receivers track the pulse ID sequence to
//! detect missed, duplicated and reverted messages.
//!
//! # Crate Structure
//!
//! - [`transport`]: multipart transport contract, socket modes, in-memory transport
//! - [`frame`]: length-prefixed multipart framing over byte streams
//! - [`stream`]: TCP PUSH/PULL and PUB/SUB streams (behind `stream` feature)
//! - [`protocol`]: channels, headers, sender, receiver and consistency checking

/// Re-export transport types.
pub mod transport {
    pub use bsread_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use bsread_frame::*;
}

/// Re-export stream types (requires `stream` feature).
#[cfg(feature = "stream")]
pub mod stream {
    pub use bsread_stream::*;
}

/// Re-export protocol types.
pub mod protocol {
    pub use bsread_protocol::*;
}

pub use bsread_protocol::{
    ChannelMetadata, ConsistencyChecker, DataType, ProtocolError, Receiver, SendOptions, Sender,
    SenderConfig, Value,
};
pub use bsread_transport::{ConnType, Mode, TransportConfig};

//! Transport contract for bsread streams.
//!
//! The protocol core only needs an ordered, reliable multipart primitive:
//! - [`FrameSink`] accepts the frames of one message, marked "more follows"
//!   until the last one
//! - [`MultipartSource`] yields complete messages
//! - [`Connector`] establishes a sink when a sender opens
//!
//! This is the lowest layer. It also carries the socket vocabulary
//! (PUSH/PULL/PUB/SUB, bind/connect), plain TCP primitives and an in-memory
//! transport used by tests and embedded pipelines.

pub mod config;
pub mod error;
pub mod memory;
pub mod queue;
pub mod tcp;
pub mod traits;

pub use config::{ConnType, Endpoint, Mode, TransportConfig, DEFAULT_PORT};
pub use error::{Result, TransportError};
pub use tcp::TcpEndpoint;
pub use traits::{Connector, FrameSink, Multipart, MultipartBuilder, MultipartSource};

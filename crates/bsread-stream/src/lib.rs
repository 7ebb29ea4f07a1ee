//! TCP multipart streams with PUSH/PULL and PUB/SUB semantics.
//!
//! This is the concrete transport used by the `bsread` CLI. Either side may
//! bind or connect. Outbound streams queue complete messages (bounded by
//! `queue_size`) and a worker thread writes them to connected peers; inbound
//! streams read messages on background threads into a bounded queue.

pub mod connector;
pub mod inbound;
pub mod outbound;

pub use connector::{connect, StreamConnector};
pub use inbound::InboundStream;
pub use outbound::OutboundStream;

use std::sync::{Mutex, MutexGuard, PoisonError};

use bsread_frame::FrameError;
use bsread_transport::TransportError;

pub(crate) fn frame_to_transport_error(err: FrameError) -> TransportError {
    match err {
        FrameError::Io(io) => TransportError::Io(io),
        FrameError::Timeout => TransportError::Io(std::io::Error::from(std::io::ErrorKind::TimedOut)),
        other => TransportError::Framing(other.to_string()),
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

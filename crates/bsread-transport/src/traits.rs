use bytes::Bytes;

use crate::error::Result;

/// One complete multipart message: every frame in send order.
pub type Multipart = Vec<Bytes>;

/// Outbound half of a multipart transport.
///
/// Frames are handed over one at a time. Every frame except the last of a
/// message is sent with `more == true`; the frame sent with `more == false`
/// closes the message and releases it to consumers as one unit.
pub trait FrameSink: Send {
    /// Append a frame to the current message.
    fn send_frame(&mut self, frame: &[u8], more: bool) -> Result<()>;

    /// Drop frames of a message that will never be completed.
    fn discard_pending(&mut self);

    /// Disconnect. A second call fails with [`TransportError::Shutdown`].
    ///
    /// [`TransportError::Shutdown`]: crate::TransportError::Shutdown
    fn close(&mut self) -> Result<()>;
}

/// Inbound half of a multipart transport.
pub trait MultipartSource {
    /// Receive the next complete message (blocking, honouring any timeout).
    fn recv_multipart(&mut self) -> Result<Multipart>;
}

/// Establishes a [`FrameSink`] when a sender opens.
pub trait Connector: Send {
    type Sink: FrameSink;

    /// Bind or connect and return a ready sink.
    fn open(&mut self) -> Result<Self::Sink>;
}

/// Accumulates frames until the message-closing frame arrives.
#[derive(Debug, Default)]
pub struct MultipartBuilder {
    parts: Multipart,
}

impl MultipartBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a frame; returns the finished message once `more` is false.
    pub fn push(&mut self, frame: &[u8], more: bool) -> Option<Multipart> {
        self.parts.push(Bytes::copy_from_slice(frame));
        if more {
            None
        } else {
            Some(std::mem::take(&mut self.parts))
        }
    }

    /// Number of frames buffered for the unfinished message.
    pub fn pending(&self) -> usize {
        self.parts.len()
    }

    pub fn clear(&mut self) {
        self.parts.clear();
    }
}

//! In-process multipart transport backed by a bounded channel.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::debug;

use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::queue::{dequeue, enqueue, try_dequeue, Enqueued};
use crate::traits::{Connector, FrameSink, Multipart, MultipartBuilder, MultipartSource};

/// Create a connected in-memory pair.
///
/// Only `queue_size`, `block`, `send_timeout` and `receive_timeout` of the
/// config apply; address, mode and role are ignored.
pub fn channel(config: &TransportConfig) -> (MemoryConnector, MemorySource) {
    let (tx, rx) = bounded(config.queue_size.max(1));
    (
        MemoryConnector {
            tx,
            block: config.block,
            send_timeout: config.send_timeout,
        },
        MemorySource {
            rx,
            receive_timeout: config.receive_timeout,
        },
    )
}

/// Opens [`MemorySink`]s feeding the paired [`MemorySource`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    tx: Sender<Multipart>,
    block: bool,
    send_timeout: Option<Duration>,
}

impl Connector for MemoryConnector {
    type Sink = MemorySink;

    fn open(&mut self) -> Result<MemorySink> {
        debug!("opened in-memory sink");
        Ok(MemorySink {
            tx: Some(self.tx.clone()),
            pending: MultipartBuilder::new(),
            block: self.block,
            send_timeout: self.send_timeout,
            dropped: 0,
        })
    }
}

/// Sending end of an in-memory transport.
#[derive(Debug)]
pub struct MemorySink {
    tx: Option<Sender<Multipart>>,
    pending: MultipartBuilder,
    block: bool,
    send_timeout: Option<Duration>,
    dropped: u64,
}

impl MemorySink {
    /// Messages discarded by a non-blocking sink because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl FrameSink for MemorySink {
    fn send_frame(&mut self, frame: &[u8], more: bool) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(TransportError::Shutdown)?;
        let Some(message) = self.pending.push(frame, more) else {
            return Ok(());
        };
        if enqueue(tx, message, self.block, self.send_timeout)? == Enqueued::Dropped {
            self.dropped += 1;
        }
        Ok(())
    }

    fn discard_pending(&mut self) {
        self.pending.clear();
    }

    fn close(&mut self) -> Result<()> {
        self.pending.clear();
        self.tx.take().map(drop).ok_or(TransportError::Shutdown)
    }
}

/// Receiving end of an in-memory transport.
#[derive(Debug)]
pub struct MemorySource {
    rx: Receiver<Multipart>,
    receive_timeout: Option<Duration>,
}

impl MemorySource {
    /// Return the next message if one is already queued.
    pub fn try_recv_multipart(&mut self) -> Result<Option<Multipart>> {
        try_dequeue(&self.rx)
    }
}

impl MultipartSource for MemorySource {
    fn recv_multipart(&mut self) -> Result<Multipart> {
        dequeue(&self.rx, self.receive_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(queue_size: usize, block: bool) -> TransportConfig {
        TransportConfig {
            queue_size,
            block,
            send_timeout: Some(Duration::from_millis(10)),
            receive_timeout: Some(Duration::from_millis(10)),
            ..TransportConfig::default()
        }
    }

    #[test]
    fn delivers_complete_messages_only() {
        let (mut connector, mut source) = channel(&config(4, true));
        let mut sink = connector.open().unwrap();

        sink.send_frame(b"main", true).unwrap();
        sink.send_frame(b"data", true).unwrap();
        assert!(source.try_recv_multipart().unwrap().is_none());

        sink.send_frame(b"value", false).unwrap();
        let message = source.recv_multipart().unwrap();
        assert_eq!(message.len(), 3);
        assert_eq!(message[2].as_ref(), b"value");
    }

    #[test]
    fn discarded_frames_never_arrive() {
        let (mut connector, mut source) = channel(&config(4, true));
        let mut sink = connector.open().unwrap();

        sink.send_frame(b"partial", true).unwrap();
        sink.discard_pending();
        sink.send_frame(b"whole", false).unwrap();

        let message = source.recv_multipart().unwrap();
        assert_eq!(message, vec![bytes::Bytes::from_static(b"whole")]);
    }

    #[test]
    fn blocking_sink_times_out_on_full_queue() {
        let (mut connector, _source) = channel(&config(1, true));
        let mut sink = connector.open().unwrap();

        sink.send_frame(b"first", false).unwrap();
        let err = sink.send_frame(b"second", false).unwrap_err();
        assert!(matches!(err, TransportError::SendTimeout(_)));
    }

    #[test]
    fn non_blocking_sink_drops_on_full_queue() {
        let (mut connector, mut source) = channel(&config(1, false));
        let mut sink = connector.open().unwrap();

        sink.send_frame(b"first", false).unwrap();
        sink.send_frame(b"second", false).unwrap();
        assert_eq!(sink.dropped(), 1);

        assert_eq!(source.recv_multipart().unwrap()[0].as_ref(), b"first");
        assert!(matches!(
            source.recv_multipart(),
            Err(TransportError::ReceiveTimeout(_))
        ));
    }

    #[test]
    fn second_close_fails() {
        let (mut connector, _source) = channel(&config(1, true));
        let mut sink = connector.open().unwrap();

        sink.close().unwrap();
        assert!(matches!(sink.close(), Err(TransportError::Shutdown)));
        assert!(matches!(
            sink.send_frame(b"x", false),
            Err(TransportError::Shutdown)
        ));
    }
}

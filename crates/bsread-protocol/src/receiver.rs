//! Receiving side: decode messages and track pulse ID consistency.

use bsread_transport::MultipartSource;

use crate::compression::CompressionRegistry;
use crate::consistency::{ConsistencyChecker, Statistics};
use crate::decode::{decode_body, parse_main_header, DecodedMessage, HeaderCache};
use crate::error::{ProtocolError, Result};

/// Reads bsread messages from a [`MultipartSource`].
///
/// The pulse ID of every message reaches the consistency checker before
/// the rest of the message is decoded.
#[derive(Debug)]
pub struct Receiver<S> {
    source: S,
    cache: HeaderCache,
    compression: CompressionRegistry,
    checker: ConsistencyChecker,
    messages: u64,
    bytes: u64,
}

impl<S: MultipartSource> Receiver<S> {
    pub fn new(source: S) -> Self {
        Self::with_compression(source, CompressionRegistry::default())
    }

    pub fn with_compression(source: S, compression: CompressionRegistry) -> Self {
        Self {
            source,
            cache: HeaderCache::new(),
            compression,
            checker: ConsistencyChecker::new(),
            messages: 0,
            bytes: 0,
        }
    }

    /// Receive and decode the next message.
    pub fn receive(&mut self) -> Result<DecodedMessage> {
        let frames = self.source.recv_multipart()?;
        self.messages += 1;
        self.bytes += frames.iter().map(|frame| frame.len() as u64).sum::<u64>();

        let first = frames
            .first()
            .ok_or_else(|| ProtocolError::Decode("empty message".to_string()))?;
        let main_header = parse_main_header(first)?;
        self.checker.observe(main_header.pulse_id);

        decode_body(main_header, &frames, &mut self.cache, &self.compression)
    }

    pub fn statistics(&self) -> Statistics {
        self.checker.statistics()
    }

    pub fn checker(&self) -> &ConsistencyChecker {
        &self.checker
    }

    pub fn messages_received(&self) -> u64 {
        self.messages
    }

    /// Total payload bytes of every received frame.
    pub fn bytes_received(&self) -> u64 {
        self.bytes
    }

    /// Zero the counters and forget the last pulse ID and data header.
    pub fn reset(&mut self) {
        self.checker.reset();
        self.cache.clear();
        self.messages = 0;
        self.bytes = 0;
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

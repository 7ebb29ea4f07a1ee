//! Decoding of received messages.
//!
//! The pulse ID comes from the main header alone. Channel values are decoded
//! independently, so one bad channel never hides the others.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::channel::ChannelMetadata;
use crate::compression::CompressionRegistry;
use crate::error::{ProtocolError, Result};
use crate::header::{DataHeader, MainHeader, Timestamp};
use crate::value::{self, Value};

/// The outcome of decoding one channel's frames.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelValue {
    /// The sender had no value for this pulse (two empty frames).
    Missing,
    Value(Value),
    /// The frames could not be decoded.
    Error(String),
}

impl ChannelValue {
    pub fn value(&self) -> Option<&Value> {
        match self {
            ChannelValue::Value(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelData {
    pub name: String,
    pub value: ChannelValue,
    pub timestamp: Option<Timestamp>,
}

#[derive(Debug, Clone)]
pub struct DecodedMessage {
    pub main_header: MainHeader,
    pub data_header: Arc<DataHeader>,
    /// Whether the data header hash differed from the previous message.
    pub header_changed: bool,
    pub channels: Vec<ChannelData>,
}

impl DecodedMessage {
    pub fn pulse_id(&self) -> u64 {
        self.main_header.pulse_id
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelData> {
        self.channels.iter().find(|channel| channel.name == name)
    }
}

/// The last data header seen, keyed by its hash.
#[derive(Debug, Clone, Default)]
pub struct HeaderCache {
    hash: Option<String>,
    header: Option<Arc<DataHeader>>,
}

impl HeaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Parse the main header. A missing or malformed `pulse_id` is an error.
pub fn parse_main_header(frame: &[u8]) -> Result<MainHeader> {
    serde_json::from_slice(frame)
        .map_err(|err| ProtocolError::Decode(format!("invalid main header: {err}")))
}

/// Decode a complete message.
pub fn decode_message(
    frames: &[Bytes],
    cache: &mut HeaderCache,
    compression: &CompressionRegistry,
) -> Result<DecodedMessage> {
    let first = frames
        .first()
        .ok_or_else(|| ProtocolError::Decode("empty message".to_string()))?;
    let main_header = parse_main_header(first)?;
    decode_body(main_header, frames, cache, compression)
}

/// Decode the data header and channel frames of a message whose main header
/// was already parsed.
pub fn decode_body(
    main_header: MainHeader,
    frames: &[Bytes],
    cache: &mut HeaderCache,
    compression: &CompressionRegistry,
) -> Result<DecodedMessage> {
    let (data_header, header_changed) = resolve_data_header(&main_header, frames, cache, compression)?;

    let expected = 2 + 2 * data_header.channels.len();
    if frames.len() > expected {
        warn!(
            pulse_id = main_header.pulse_id,
            expected,
            received = frames.len(),
            "message has more frames than channels"
        );
    }

    let channels = data_header
        .channels
        .iter()
        .enumerate()
        .map(|(index, metadata)| {
            let value_frame = frames.get(2 + 2 * index);
            let timestamp_frame = frames.get(3 + 2 * index);
            let (value, timestamp) = match (value_frame, timestamp_frame) {
                (Some(value_frame), Some(timestamp_frame)) => {
                    if value_frame.is_empty() && timestamp_frame.is_empty() {
                        (ChannelValue::Missing, None)
                    } else {
                        (
                            decode_value(value_frame, metadata, compression),
                            Timestamp::from_bytes(timestamp_frame, metadata.byte_order),
                        )
                    }
                }
                _ => (
                    ChannelValue::Error("frames missing from message".to_string()),
                    None,
                ),
            };
            ChannelData {
                name: metadata.name.clone(),
                value,
                timestamp,
            }
        })
        .collect();

    Ok(DecodedMessage {
        main_header,
        data_header,
        header_changed,
        channels,
    })
}

fn resolve_data_header(
    main_header: &MainHeader,
    frames: &[Bytes],
    cache: &mut HeaderCache,
    compression: &CompressionRegistry,
) -> Result<(Arc<DataHeader>, bool)> {
    if let (Some(hash), Some(header)) = (&cache.hash, &cache.header) {
        if *hash == main_header.hash {
            return Ok((Arc::clone(header), false));
        }
    }

    let frame = frames
        .get(1)
        .ok_or_else(|| ProtocolError::Decode("data header frame missing".to_string()))?;
    let provider = compression
        .resolve(main_header.dh_compression.as_deref())
        .map_err(|err| ProtocolError::Decode(format!("data header: {err}")))?;
    let json = provider
        .decompress(frame)
        .map_err(|err| ProtocolError::Decode(format!("data header: {err}")))?;
    let header: DataHeader = serde_json::from_slice(&json)
        .map_err(|err| ProtocolError::Decode(format!("invalid data header: {err}")))?;

    debug!(
        channels = header.channels.len(),
        hash = %main_header.hash,
        "data header changed"
    );

    let header = Arc::new(header);
    cache.hash = Some(main_header.hash.clone());
    cache.header = Some(Arc::clone(&header));
    Ok((header, true))
}

fn decode_value(
    frame: &[u8],
    metadata: &ChannelMetadata,
    compression: &CompressionRegistry,
) -> ChannelValue {
    let raw = match compression
        .resolve(metadata.compression.as_deref())
        .map_err(|err| err.to_string())
        .and_then(|provider| provider.decompress(frame).map_err(|err| err.to_string()))
    {
        Ok(raw) => raw,
        Err(message) => return ChannelValue::Error(message),
    };
    match value::decode(&raw, metadata.data_type, &metadata.shape, metadata.byte_order) {
        Ok(value) => ChannelValue::Value(value),
        Err(err) => ChannelValue::Error(err.to_string()),
    }
}

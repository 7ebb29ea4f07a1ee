//! Assembly of the frames of one message.

use bsread_transport::{FrameSink, Multipart};
use bytes::Bytes;

use crate::channel::ChannelRegistry;
use crate::error::{ProtocolError, Result};
use crate::header::{build_main_header, EncodedDataHeader, Timestamp};
use crate::value::{self, Value};

/// Number of frames in a message carrying `channels` channels.
pub fn frame_count(channels: usize) -> usize {
    2 + 2 * channels
}

/// Build the frames of one message.
///
/// `values` is aligned with the registry order. A missing value becomes an
/// empty value frame plus an empty timestamp frame. Every channel's
/// timestamp frame carries the message's global timestamp.
pub fn assemble(
    data_header: &EncodedDataHeader,
    registry: &ChannelRegistry,
    values: &[Option<Value>],
    pulse_id: u64,
    timestamp: Timestamp,
) -> Result<Multipart> {
    if values.len() != registry.len() {
        return Err(ProtocolError::Validation(format!(
            "length of passed data ({}) does not correspond to configured channels ({})",
            values.len(),
            registry.len()
        )));
    }

    let main_header = build_main_header(data_header, pulse_id, timestamp);
    let mut frames = Vec::with_capacity(frame_count(values.len()));
    frames.push(Bytes::from(main_header.to_bytes()?));
    frames.push(data_header.bytes.clone());

    for (channel, value) in registry.iter().zip(values) {
        let Some(value) = value else {
            frames.push(Bytes::new());
            frames.push(Bytes::new());
            continue;
        };
        let metadata = channel.metadata();
        let raw = value::encode(
            value,
            metadata.data_type,
            &metadata.shape,
            metadata.byte_order,
        )
        .map_err(|source| ProtocolError::Codec {
            channel: metadata.name.clone(),
            source,
        })?;
        frames.push(Bytes::from(channel.compressor().compress(&raw)));
        frames.push(Bytes::copy_from_slice(
            &timestamp.to_bytes(metadata.byte_order),
        ));
    }
    Ok(frames)
}

/// Hand `frames` to `sink` as one multipart message.
///
/// On failure the frames already handed over are discarded, so a partial
/// message is never released.
pub fn send_frames<S>(sink: &mut S, frames: &[Bytes]) -> Result<()>
where
    S: FrameSink + ?Sized,
{
    let Some(last) = frames.len().checked_sub(1) else {
        return Err(ProtocolError::Validation("empty message".to_string()));
    };
    for (index, frame) in frames.iter().enumerate() {
        if let Err(err) = sink.send_frame(frame, index != last) {
            sink.discard_pending();
            return Err(err.into());
        }
    }
    Ok(())
}

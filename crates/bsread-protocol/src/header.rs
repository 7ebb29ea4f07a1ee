//! Main and data headers.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::channel::{ChannelMetadata, ChannelRegistry};
use crate::error::Result;
use crate::value::ByteOrder;

/// `htype` of the main header.
pub const MAIN_HEADER_TYPE: &str = "bsr_m-1.1";

/// `htype` of the data header.
pub const DATA_HEADER_TYPE: &str = "bsr_d-1.1";

/// Size of an encoded per-channel timestamp frame.
pub const TIMESTAMP_SIZE: usize = 16;

/// Seconds and nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp {
    pub sec: i64,
    pub ns: i64,
}

impl Timestamp {
    pub fn new(sec: i64, ns: i64) -> Self {
        Self { sec, ns }
    }

    pub fn now() -> Self {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            sec: elapsed.as_secs() as i64,
            ns: i64::from(elapsed.subsec_nanos()),
        }
    }

    /// Split fractional epoch seconds.
    pub fn from_secs_f64(secs: f64) -> Self {
        let sec = secs.trunc();
        Self {
            sec: sec as i64,
            ns: ((secs - sec) * 1e9) as i64,
        }
    }

    /// Encode as a timestamp frame: seconds then nanoseconds, 8 bytes each.
    pub fn to_bytes(self, order: ByteOrder) -> [u8; TIMESTAMP_SIZE] {
        let (sec, ns) = match order {
            ByteOrder::Little => (self.sec.to_le_bytes(), self.ns.to_le_bytes()),
            ByteOrder::Big => (self.sec.to_be_bytes(), self.ns.to_be_bytes()),
        };
        let mut out = [0u8; TIMESTAMP_SIZE];
        out[..8].copy_from_slice(&sec);
        out[8..].copy_from_slice(&ns);
        out
    }

    /// Decode a timestamp frame; `None` unless it is exactly 16 bytes.
    pub fn from_bytes(bytes: &[u8], order: ByteOrder) -> Option<Self> {
        if bytes.len() != TIMESTAMP_SIZE {
            return None;
        }
        let mut sec = [0u8; 8];
        let mut ns = [0u8; 8];
        sec.copy_from_slice(&bytes[..8]);
        ns.copy_from_slice(&bytes[8..]);
        Some(match order {
            ByteOrder::Little => Self::new(i64::from_le_bytes(sec), i64::from_le_bytes(ns)),
            ByteOrder::Big => Self::new(i64::from_be_bytes(sec), i64::from_be_bytes(ns)),
        })
    }
}

/// The data header: ordered channel descriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataHeader {
    pub htype: String,
    pub channels: Vec<ChannelMetadata>,
}

impl DataHeader {
    pub fn new(channels: Vec<ChannelMetadata>) -> Self {
        Self {
            htype: DATA_HEADER_TYPE.to_string(),
            channels,
        }
    }
}

/// A data header together with the exact bytes placed on the wire.
#[derive(Debug, Clone)]
pub struct EncodedDataHeader {
    pub header: DataHeader,
    /// Serialized and, if configured, compressed header.
    pub bytes: Bytes,
    /// Hex MD5 of `bytes`.
    pub hash: String,
    /// Name carried as `dh_compression` in the main header.
    pub compression: Option<String>,
}

/// The main header sent first in every message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainHeader {
    pub htype: String,
    pub pulse_id: u64,
    #[serde(default)]
    pub global_timestamp: Timestamp,
    #[serde(default)]
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dh_compression: Option<String>,
}

impl MainHeader {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Hex MD5 digest of a serialized data header.
pub fn header_hash(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

/// Serialize the registry's channels, applying `compression` to the result.
///
/// Identical registry state always yields identical bytes.
pub fn build_data_header(
    registry: &ChannelRegistry,
    compression: Option<&str>,
) -> Result<EncodedDataHeader> {
    let header = DataHeader::new(registry.metadata());
    let json = serde_json::to_vec(&header)?;
    let provider = registry.compression().resolve(compression)?;
    let bytes = Bytes::from(provider.compress(&json));
    let hash = header_hash(&bytes);

    debug!(channels = header.channels.len(), hash = %hash, "built data header");

    Ok(EncodedDataHeader {
        header,
        bytes,
        hash,
        compression: compression.map(str::to_string),
    })
}

/// Main header for one message.
pub fn build_main_header(
    data_header: &EncodedDataHeader,
    pulse_id: u64,
    timestamp: Timestamp,
) -> MainHeader {
    MainHeader {
        htype: MAIN_HEADER_TYPE.to_string(),
        pulse_id,
        global_timestamp: timestamp,
        hash: data_header.hash.clone(),
        dh_compression: data_header.compression.clone(),
    }
}

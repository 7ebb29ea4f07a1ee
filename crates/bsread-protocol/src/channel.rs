//! Channel metadata and the ordered channel registry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::compression::{CompressionProvider, CompressionRegistry};
use crate::error::{ProtocolError, Result};
use crate::value::{ByteOrder, DataType, Value};

/// Keys with a fixed meaning in a channel's data header entry.
const RESERVED_KEYS: [&str; 5] = ["name", "type", "shape", "encoding", "compression"];

/// Produces a channel's value for a pulse; `None` sends the empty marker.
pub type ValueSource = Box<dyn FnMut(u64) -> Option<Value> + Send>;

/// Box a closure as a [`ValueSource`].
pub fn value_source<F>(f: F) -> ValueSource
where
    F: FnMut(u64) -> Option<Value> + Send + 'static,
{
    Box::new(f)
}

fn default_shape() -> Vec<u32> {
    vec![1]
}

/// One entry of the data header's `channels` list.
///
/// Keys other than the fixed ones are kept in `extra` and serialized after
/// them in sorted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub data_type: DataType,
    #[serde(default = "default_shape")]
    pub shape: Vec<u32>,
    #[serde(rename = "encoding", default)]
    pub byte_order: ByteOrder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for ChannelMetadata {
    fn default() -> Self {
        Self {
            name: String::new(),
            data_type: DataType::default(),
            shape: default_shape(),
            byte_order: ByteOrder::native(),
            compression: None,
            extra: BTreeMap::new(),
        }
    }
}

impl ChannelMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Metadata describing `value`: its type and shape, native byte order.
    pub fn from_value(name: impl Into<String>, value: &Value) -> Self {
        Self {
            name: name.into(),
            data_type: value.data_type(),
            shape: value.shape(),
            ..Self::default()
        }
    }

    /// Parse user-supplied metadata. It must be a JSON object.
    pub fn from_json(name: impl Into<String>, metadata: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(mut fields) = metadata else {
            return Err(ProtocolError::Configuration(
                "metadata needs to be a mapping".to_string(),
            ));
        };
        fields.insert("name".to_string(), serde_json::Value::String(name.into()));
        serde_json::from_value(serde_json::Value::Object(fields))
            .map_err(|err| ProtocolError::Configuration(format!("invalid channel metadata: {err}")))
    }

    pub fn with_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn with_shape(mut self, shape: Vec<u32>) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn with_compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Attach an additional key such as `unit` or `modulo`.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// A registered channel.
pub struct Channel {
    metadata: ChannelMetadata,
    source: Option<ValueSource>,
    compressor: Arc<dyn CompressionProvider>,
}

impl Channel {
    pub fn metadata(&self) -> &ChannelMetadata {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub(crate) fn compressor(&self) -> &dyn CompressionProvider {
        self.compressor.as_ref()
    }

    /// Ask the value source for this pulse's value.
    pub(crate) fn produce(&mut self, pulse_id: u64) -> Option<Value> {
        self.source.as_mut().and_then(|source| source(pulse_id))
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("metadata", &self.metadata)
            .field("has_source", &self.source.is_some())
            .field("compression", &self.compressor.name())
            .finish()
    }
}

/// Channels in insertion order. The order is the order of the data header
/// entries and of the value frames.
#[derive(Debug)]
pub struct ChannelRegistry {
    channels: Vec<Channel>,
    compression: CompressionRegistry,
    default_compression: Option<String>,
    changed: bool,
}

impl ChannelRegistry {
    /// Empty registry. `default_compression` applies to channels registered
    /// without an explicit compression and must name a known provider.
    pub fn new(compression: CompressionRegistry, default_compression: Option<String>) -> Result<Self> {
        compression.resolve(default_compression.as_deref())?;
        Ok(Self {
            channels: Vec::new(),
            compression,
            default_compression,
            changed: false,
        })
    }

    /// Add a channel, or replace the one with the same name in place.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        source: Option<ValueSource>,
        mut metadata: ChannelMetadata,
    ) -> Result<()> {
        metadata.name = name.into();
        let channel = self.prepare(metadata, source)?;
        self.insert(channel);
        Ok(())
    }

    /// Like [`register`](Self::register) with JSON metadata.
    pub fn register_json(
        &mut self,
        name: impl Into<String>,
        source: Option<ValueSource>,
        metadata: serde_json::Value,
    ) -> Result<()> {
        let name = name.into();
        let metadata = ChannelMetadata::from_json(name.clone(), metadata)?;
        self.register(name, source, metadata)
    }

    /// Register a channel whose type and shape are taken from `value`.
    pub fn register_from_value(&mut self, name: impl Into<String>, value: &Value) -> Result<()> {
        let metadata = ChannelMetadata::from_value(name, value);
        let channel = self.prepare(metadata, None)?;
        self.insert(channel);
        Ok(())
    }

    /// Replace every channel with channels inferred from `values`, in order.
    ///
    /// An entry without a value keeps its previous metadata if the name was
    /// registered before. On error the registry is left untouched.
    pub fn reset_and_register_many<'a, I>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, Option<&'a Value>)>,
    {
        let mut channels: Vec<Channel> = Vec::new();
        for (name, value) in values {
            let metadata = match value {
                Some(value) => ChannelMetadata::from_value(name, value),
                None => self
                    .get(name)
                    .map(|channel| channel.metadata.clone())
                    .unwrap_or_else(|| ChannelMetadata::new(name)),
            };
            let channel = self.prepare(metadata, None)?;
            match channels.iter_mut().find(|c| c.name() == name) {
                Some(existing) => *existing = channel,
                None => channels.push(channel),
            }
        }
        self.channels = channels;
        self.changed = true;
        Ok(())
    }

    /// Align the type and shape of the channel at `index` with `value`.
    /// Returns whether the metadata changed.
    pub fn adapt_to_value(&mut self, index: usize, value: &Value) -> bool {
        let Some(channel) = self.channels.get_mut(index) else {
            return false;
        };
        let data_type = value.data_type();
        let shape = value.shape();
        if channel.metadata.data_type == data_type && channel.metadata.shape == shape {
            return false;
        }
        // An empty array cannot describe a shape; encoding reports the mismatch.
        if shape.is_empty() || shape.contains(&0) {
            return false;
        }
        channel.metadata.data_type = data_type;
        channel.metadata.shape = shape;
        self.changed = true;
        true
    }

    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.channels
            .iter()
            .map(|channel| channel.name().to_string())
            .collect()
    }

    /// Metadata of every channel, in header order.
    pub fn metadata(&self) -> Vec<ChannelMetadata> {
        self.channels
            .iter()
            .map(|channel| channel.metadata.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn clear(&mut self) {
        self.channels.clear();
        self.changed = true;
    }

    pub fn compression(&self) -> &CompressionRegistry {
        &self.compression
    }

    pub fn default_compression(&self) -> Option<&str> {
        self.default_compression.as_deref()
    }

    /// Whether the channel set or any metadata changed since the last call.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    /// Values from each channel's source for `pulse_id`, in header order.
    pub(crate) fn produce(&mut self, pulse_id: u64) -> Vec<Option<Value>> {
        self.channels
            .iter_mut()
            .map(|channel| channel.produce(pulse_id))
            .collect()
    }

    fn prepare(&self, mut metadata: ChannelMetadata, source: Option<ValueSource>) -> Result<Channel> {
        if metadata.name.is_empty() {
            return Err(ProtocolError::Configuration(
                "channel name must not be empty".to_string(),
            ));
        }
        if let Some(key) = metadata
            .extra
            .keys()
            .find(|key| RESERVED_KEYS.contains(&key.as_str()))
        {
            return Err(ProtocolError::Configuration(format!(
                "channel '{}': '{key}' is not an additional metadata key",
                metadata.name
            )));
        }
        if metadata.shape.is_empty() || metadata.shape.contains(&0) {
            return Err(ProtocolError::Configuration(format!(
                "channel '{}': shape {:?} must list positive dimensions",
                metadata.name, metadata.shape
            )));
        }
        if metadata.compression.is_none() {
            metadata.compression = self.default_compression.clone();
        }
        let compressor = self.compression.resolve(metadata.compression.as_deref())?;
        Ok(Channel {
            metadata,
            source,
            compressor,
        })
    }

    fn insert(&mut self, channel: Channel) {
        match self
            .channels
            .iter_mut()
            .find(|existing| existing.name() == channel.name())
        {
            Some(existing) => *existing = channel,
            None => self.channels.push(channel),
        }
        self.changed = true;
    }
}

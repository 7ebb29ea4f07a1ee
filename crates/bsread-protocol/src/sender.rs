//! The bsread sender.
//!
//! One lock guards the channel registry, the data header, the pulse counter
//! and the transport sink. A send holds it from value resolution until the
//! last frame is handed to the transport, so a concurrent registration is
//! either fully visible in a message or not at all.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bsread_transport::{Connector, FrameSink};
use tracing::info;

use crate::channel::{ChannelMetadata, ChannelRegistry, ValueSource};
use crate::compression::CompressionRegistry;
use crate::config::SenderConfig;
use crate::error::{HookError, ProtocolError, Result};
use crate::header::{build_data_header, EncodedDataHeader, Timestamp};
use crate::message::{assemble, send_frames};
use crate::value::Value;

/// Runs inside the send lock before values are encoded. It may change
/// channels; the data header is rebuilt afterwards if it did.
pub type PreSendHook =
    Box<dyn FnMut(&mut ChannelRegistry) -> std::result::Result<(), HookError> + Send>;

/// Runs after a successful send, outside the lock, with the sent pulse ID.
pub type PostSendHook = Box<dyn FnMut(u64) -> std::result::Result<(), HookError> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Unopened,
    Open,
    Closed,
}

/// Values supplied with a send call instead of the channels' value sources.
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    /// One value per registered channel, in registry order.
    Positional(Vec<Option<Value>>),
    /// Values by channel name.
    Named(Vec<(String, Option<Value>)>),
}

/// Per-call options of [`Sender::send`].
#[derive(Debug, Clone, PartialEq)]
pub struct SendOptions {
    pub values: Option<Values>,
    /// Pulse ID embedded in the message instead of the counter value. The
    /// counter still advances by one.
    pub pulse_id: Option<u64>,
    /// Defaults to the current time.
    pub timestamp: Option<Timestamp>,
    /// Re-derive channel metadata from supplied values.
    pub check_data: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            values: None,
            pulse_id: None,
            timestamp: None,
            check_data: true,
        }
    }
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positional(mut self, values: Vec<Option<Value>>) -> Self {
        self.values = Some(Values::Positional(values));
        self
    }

    pub fn named<I, K>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<Value>)>,
        K: Into<String>,
    {
        self.values = Some(Values::Named(
            values
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        ));
        self
    }

    pub fn pulse_id(mut self, pulse_id: u64) -> Self {
        self.pulse_id = Some(pulse_id);
        self
    }

    pub fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn check_data(mut self, check_data: bool) -> Self {
        self.check_data = check_data;
        self
    }
}

struct Inner<C: Connector> {
    connector: C,
    sink: Option<C::Sink>,
    state: SenderState,
    registry: ChannelRegistry,
    data_header: Option<EncodedDataHeader>,
    pulse_id: u64,
    pre_send: Option<PreSendHook>,
}

impl<C: Connector> Inner<C> {
    fn ensure_open(&self) -> Result<()> {
        match self.state {
            SenderState::Open => Ok(()),
            state => Err(ProtocolError::InvalidState(format!(
                "send requires an open sender, sender is {state:?}"
            ))),
        }
    }

    fn rebuild_header(&mut self, compression: Option<&str>) -> Result<()> {
        self.registry.take_changed();
        self.data_header = Some(build_data_header(&self.registry, compression)?);
        Ok(())
    }

    /// Align supplied values with the registry, updating channel metadata
    /// first when `check_data` is set.
    fn apply_values(&mut self, values: Values, check_data: bool) -> Result<Vec<Option<Value>>> {
        match values {
            Values::Positional(values) => {
                if values.len() != self.registry.len() {
                    return Err(ProtocolError::Validation(format!(
                        "length of passed data ({}) does not correspond to configured channels ({})",
                        values.len(),
                        self.registry.len()
                    )));
                }
                if check_data {
                    for (index, value) in values.iter().enumerate() {
                        if let Some(value) = value {
                            self.registry.adapt_to_value(index, value);
                        }
                    }
                }
                Ok(values)
            }
            Values::Named(entries) => {
                let mut seen = HashSet::new();
                if let Some((name, _)) = entries.iter().find(|(name, _)| !seen.insert(name.as_str())) {
                    return Err(ProtocolError::Validation(format!(
                        "channel '{name}' supplied more than once"
                    )));
                }

                if check_data {
                    let same_channels = entries.len() == self.registry.len()
                        && entries
                            .iter()
                            .zip(self.registry.iter())
                            .all(|((name, _), channel)| name == channel.name());
                    if same_channels {
                        for (index, (_, value)) in entries.iter().enumerate() {
                            if let Some(value) = value {
                                self.registry.adapt_to_value(index, value);
                            }
                        }
                    } else {
                        self.registry.reset_and_register_many(
                            entries
                                .iter()
                                .map(|(name, value)| (name.as_str(), value.as_ref())),
                        )?;
                    }
                    return Ok(entries.into_iter().map(|(_, value)| value).collect());
                }

                if let Some((name, _)) = entries
                    .iter()
                    .find(|(name, _)| self.registry.get(name).is_none())
                {
                    return Err(ProtocolError::Validation(format!(
                        "channel '{name}' is not registered"
                    )));
                }
                let mut entries = entries;
                Ok(self
                    .registry
                    .names()
                    .iter()
                    .map(|channel| {
                        entries
                            .iter_mut()
                            .find(|(name, _)| name == channel)
                            .and_then(|(_, value)| value.take())
                    })
                    .collect())
            }
        }
    }
}

/// Sends bsread messages over the sink produced by a [`Connector`].
///
/// All methods take `&self`; the sender can be shared between a producing
/// thread and threads that register channels.
pub struct Sender<C: Connector> {
    config: SenderConfig,
    inner: Mutex<Inner<C>>,
    post_send: Mutex<Option<PostSendHook>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<C: Connector> Sender<C> {
    /// Sender with only the identity compression provider.
    pub fn new(connector: C, config: SenderConfig) -> Result<Self> {
        Self::with_compression(connector, config, CompressionRegistry::default())
    }

    /// Sender resolving compression names against `compression`.
    ///
    /// Unknown data header or data compression names fail here.
    pub fn with_compression(
        connector: C,
        config: SenderConfig,
        compression: CompressionRegistry,
    ) -> Result<Self> {
        compression.resolve(config.data_header_compression.as_deref())?;
        let registry = ChannelRegistry::new(compression, config.data_compression.clone())?;
        Ok(Self {
            inner: Mutex::new(Inner {
                connector,
                sink: None,
                state: SenderState::Unopened,
                registry,
                data_header: None,
                pulse_id: config.start_pulse_id,
                pre_send: None,
            }),
            post_send: Mutex::new(None),
            config,
        })
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    /// Add or replace a channel. An open sender rebuilds its data header.
    pub fn register(
        &self,
        name: impl Into<String>,
        source: Option<ValueSource>,
        metadata: ChannelMetadata,
    ) -> Result<()> {
        let mut inner = lock(&self.inner);
        inner.registry.register(name, source, metadata)?;
        self.refresh_header(&mut inner)
    }

    /// Like [`register`](Self::register) with JSON metadata, which must be an
    /// object.
    pub fn register_json(
        &self,
        name: impl Into<String>,
        source: Option<ValueSource>,
        metadata: serde_json::Value,
    ) -> Result<()> {
        let mut inner = lock(&self.inner);
        inner.registry.register_json(name, source, metadata)?;
        self.refresh_header(&mut inner)
    }

    /// Add or replace a channel described by an example value.
    pub fn register_from_value(&self, name: impl Into<String>, value: &Value) -> Result<()> {
        let mut inner = lock(&self.inner);
        inner.registry.register_from_value(name, value)?;
        self.refresh_header(&mut inner)
    }

    /// Remove every channel.
    pub fn clear_channels(&self) -> Result<()> {
        let mut inner = lock(&self.inner);
        inner.registry.clear();
        self.refresh_header(&mut inner)
    }

    fn refresh_header(&self, inner: &mut Inner<C>) -> Result<()> {
        if inner.state == SenderState::Open {
            inner.rebuild_header(self.config.data_header_compression.as_deref())?;
        }
        Ok(())
    }

    /// Bind or connect the transport and build the headers.
    ///
    /// Reopening a closed sender keeps its channels and pulse counter.
    pub fn open(&self) -> Result<()> {
        let mut inner = lock(&self.inner);
        if inner.state == SenderState::Open {
            return Err(ProtocolError::InvalidState(
                "sender is already open".to_string(),
            ));
        }
        let sink = inner.connector.open()?;
        inner.sink = Some(sink);
        inner.rebuild_header(self.config.data_header_compression.as_deref())?;
        inner.state = SenderState::Open;
        info!(
            pulse_id = inner.pulse_id,
            channels = inner.registry.len(),
            "sender opened"
        );
        Ok(())
    }

    /// Disconnect the transport. Closing twice reports the transport's error.
    pub fn close(&self) -> Result<()> {
        let mut inner = lock(&self.inner);
        let sink = inner.sink.as_mut().ok_or_else(|| {
            ProtocolError::InvalidState("sender was never opened".to_string())
        })?;
        let closed = sink.close();
        inner.state = SenderState::Closed;
        closed?;
        info!(pulse_id = inner.pulse_id, "sender closed");
        Ok(())
    }

    /// Send one message and return the pulse ID embedded in it.
    ///
    /// The pulse counter advances by one only once every frame was handed to
    /// the transport.
    pub fn send(&self, options: SendOptions) -> Result<u64> {
        let SendOptions {
            values,
            pulse_id,
            timestamp,
            check_data,
        } = options;
        let timestamp = timestamp.unwrap_or_else(Timestamp::now);

        let sent = {
            let mut guard = lock(&self.inner);
            let inner = &mut *guard;
            inner.ensure_open()?;
            let embedded = pulse_id.unwrap_or(inner.pulse_id);

            let values = match values {
                Some(values) => Some(inner.apply_values(values, check_data)?),
                None => None,
            };

            if let Some(hook) = inner.pre_send.as_mut() {
                hook(&mut inner.registry).map_err(ProtocolError::Hook)?;
            }

            if inner.registry.take_changed() || inner.data_header.is_none() {
                inner.rebuild_header(self.config.data_header_compression.as_deref())?;
            }

            let values = match values {
                Some(values) => values,
                None => inner.registry.produce(embedded),
            };
            let data_header = inner.data_header.as_ref().ok_or_else(|| {
                ProtocolError::InvalidState("data header missing".to_string())
            })?;
            let frames = assemble(data_header, &inner.registry, &values, embedded, timestamp)?;

            let sink = inner
                .sink
                .as_mut()
                .ok_or_else(|| ProtocolError::InvalidState("transport missing".to_string()))?;
            send_frames(sink, &frames)?;

            inner.pulse_id = inner.pulse_id.wrapping_add(1);
            embedded
        };

        if let Some(hook) = lock(&self.post_send).as_mut() {
            hook(sent).map_err(|source| ProtocolError::PostSendHook {
                pulse_id: sent,
                source,
            })?;
        }
        Ok(sent)
    }

    /// Open if needed, send `n_messages` (or until `stop` is set) with
    /// `interval` between messages, then close.
    ///
    /// Returns the number of messages sent. A stop request is not an error.
    pub fn generate_stream(
        &self,
        n_messages: Option<u64>,
        interval: Duration,
        stop: &AtomicBool,
    ) -> Result<u64> {
        if self.state() != SenderState::Open {
            self.open()?;
        }

        let mut sent = 0u64;
        let outcome = loop {
            if stop.load(Ordering::SeqCst) || n_messages.is_some_and(|n| sent >= n) {
                break Ok(sent);
            }
            if let Err(err) = self.send(SendOptions::default()) {
                break Err(err);
            }
            sent += 1;
            if !interval.is_zero() {
                std::thread::sleep(interval);
            }
        };

        let closed = self.close();
        let sent = outcome?;
        closed?;
        info!(messages = sent, "stream generation finished");
        Ok(sent)
    }

    /// Counter value the next message will carry unless overridden.
    pub fn pulse_id(&self) -> u64 {
        lock(&self.inner).pulse_id
    }

    /// Set the counter back to the configured start pulse ID.
    pub fn reset_pulse_id(&self) {
        lock(&self.inner).pulse_id = self.config.start_pulse_id;
    }

    pub fn channel_names(&self) -> Vec<String> {
        lock(&self.inner).registry.names()
    }

    pub fn state(&self) -> SenderState {
        lock(&self.inner).state
    }

    /// Hash of the current data header, once the sender has been opened.
    pub fn data_header_hash(&self) -> Option<String> {
        lock(&self.inner)
            .data_header
            .as_ref()
            .map(|header| header.hash.clone())
    }

    pub fn set_pre_send_hook<F>(&self, hook: F)
    where
        F: FnMut(&mut ChannelRegistry) -> std::result::Result<(), HookError> + Send + 'static,
    {
        lock(&self.inner).pre_send = Some(Box::new(hook));
    }

    pub fn set_post_send_hook<F>(&self, hook: F)
    where
        F: FnMut(u64) -> std::result::Result<(), HookError> + Send + 'static,
    {
        *lock(&self.post_send) = Some(Box::new(hook));
    }

    pub fn clear_hooks(&self) {
        lock(&self.inner).pre_send = None;
        *lock(&self.post_send) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::value_source;
    use crate::decode::{decode_message, ChannelValue, HeaderCache};
    use crate::header::MainHeader;
    use crate::value::DataType;
    use bsread_transport::memory::{channel, MemoryConnector, MemorySource};
    use bsread_transport::{Multipart, MultipartSource, TransportConfig, TransportError};
    use std::sync::Arc;

    fn transport(queue_size: usize) -> (MemoryConnector, MemorySource) {
        channel(&TransportConfig {
            queue_size,
            send_timeout: Some(Duration::from_millis(20)),
            receive_timeout: Some(Duration::from_millis(200)),
            ..TransportConfig::default()
        })
    }

    fn sender(start_pulse_id: u64) -> (Sender<MemoryConnector>, MemorySource) {
        let (connector, source) = transport(64);
        let sender = Sender::new(connector, SenderConfig::default().with_start_pulse_id(start_pulse_id))
            .unwrap();
        (sender, source)
    }

    fn main_header(message: &Multipart) -> MainHeader {
        serde_json::from_slice(&message[0]).unwrap()
    }

    #[test]
    fn send_requires_open_sender() {
        let (sender, _source) = sender(0);
        let err = sender.send(SendOptions::default()).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidState(_)));
        assert_eq!(sender.state(), SenderState::Unopened);
    }

    #[test]
    fn sources_drive_each_message() {
        let (sender, mut source) = sender(100);
        sender
            .register(
                "pulse",
                Some(value_source(|pulse_id| Some(Value::from(pulse_id as f64)))),
                ChannelMetadata::default(),
            )
            .unwrap();
        sender
            .register("nothing", None, ChannelMetadata::default())
            .unwrap();
        sender.open().unwrap();

        assert_eq!(sender.send(SendOptions::default()).unwrap(), 100);
        let message = source.recv_multipart().unwrap();
        assert_eq!(message.len(), 6);
        assert_eq!(main_header(&message).pulse_id, 100);

        let decoded = decode_message(
            &message,
            &mut HeaderCache::new(),
            &CompressionRegistry::default(),
        )
        .unwrap();
        assert_eq!(decoded.channels[0].value, ChannelValue::Value(Value::from(100.0f64)));
        assert_eq!(decoded.channels[1].value, ChannelValue::Missing);
        assert_eq!(sender.pulse_id(), 101);
    }

    #[test]
    fn override_does_not_change_counter_sequence() {
        let (sender, mut source) = sender(5);
        sender.open().unwrap();

        sender.send(SendOptions::default()).unwrap();
        sender.send(SendOptions::default().pulse_id(1000)).unwrap();
        sender.send(SendOptions::default()).unwrap();

        let embedded: Vec<u64> = (0..3)
            .map(|_| main_header(&source.recv_multipart().unwrap()).pulse_id)
            .collect();
        assert_eq!(embedded, vec![5, 1000, 7]);
        assert_eq!(sender.pulse_id(), 8);
    }

    #[test]
    fn positional_values_must_match_channel_count() {
        let (sender, _source) = sender(0);
        sender
            .register("a", None, ChannelMetadata::default())
            .unwrap();
        sender.open().unwrap();

        let err = sender
            .send(SendOptions::default().positional(vec![Some(Value::from(1.0f64)), None]))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Validation(_)));
        assert_eq!(sender.pulse_id(), 0);
    }

    #[test]
    fn positional_values_update_metadata() {
        let (sender, mut source) = sender(0);
        sender
            .register("a", None, ChannelMetadata::default())
            .unwrap();
        sender.open().unwrap();
        let before = sender.data_header_hash();

        sender
            .send(SendOptions::default().positional(vec![Some(Value::from(2.0f64))]))
            .unwrap();
        assert_eq!(sender.data_header_hash(), before);

        sender
            .send(SendOptions::default().positional(vec![Some(Value::from(vec![1i32, 2]))]))
            .unwrap();
        assert_ne!(sender.data_header_hash(), before);

        source.recv_multipart().unwrap();
        let message = source.recv_multipart().unwrap();
        let decoded = decode_message(
            &message,
            &mut HeaderCache::new(),
            &CompressionRegistry::default(),
        )
        .unwrap();
        assert_eq!(decoded.data_header.channels[0].data_type, DataType::Int32);
        assert_eq!(decoded.data_header.channels[0].shape, vec![2]);
    }

    #[test]
    fn named_values_reset_channels_when_names_change() {
        let (sender, mut source) = sender(0);
        sender
            .register("old", None, ChannelMetadata::default())
            .unwrap();
        sender.open().unwrap();

        sender
            .send(SendOptions::default().named([
                ("x", Some(Value::from(1u8))),
                ("y", Some(Value::from("label"))),
            ]))
            .unwrap();
        assert_eq!(sender.channel_names(), vec!["x", "y"]);

        let message = source.recv_multipart().unwrap();
        assert_eq!(message.len(), 6);
        let decoded = decode_message(
            &message,
            &mut HeaderCache::new(),
            &CompressionRegistry::default(),
        )
        .unwrap();
        assert_eq!(decoded.channels[1].value, ChannelValue::Value(Value::from("label")));
    }

    #[test]
    fn named_values_without_check_follow_registry_order() {
        let (sender, mut source) = sender(0);
        for name in ["a", "b"] {
            sender
                .register(name, None, ChannelMetadata::default())
                .unwrap();
        }
        sender.open().unwrap();

        sender
            .send(
                SendOptions::default()
                    .check_data(false)
                    .named([("b", Some(Value::from(2.0f64)))]),
            )
            .unwrap();
        let message = source.recv_multipart().unwrap();
        assert!(message[2].is_empty());
        assert_eq!(message[4].len(), 8);

        let err = sender
            .send(
                SendOptions::default()
                    .check_data(false)
                    .named([("zzz", Some(Value::from(2.0f64)))]),
            )
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Validation(_)));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let (sender, _source) = sender(0);
        sender.open().unwrap();
        let err = sender
            .send(SendOptions::default().named([
                ("a", Some(Value::from(1.0f64))),
                ("a", Some(Value::from(2.0f64))),
            ]))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Validation(_)));
    }

    #[test]
    fn registration_while_open_rebuilds_header() {
        let (sender, mut source) = sender(0);
        sender.open().unwrap();
        let empty = sender.data_header_hash();

        sender
            .register("late", None, ChannelMetadata::default())
            .unwrap();
        assert_ne!(sender.data_header_hash(), empty);

        sender.send(SendOptions::default()).unwrap();
        assert_eq!(source.recv_multipart().unwrap().len(), 4);
    }

    #[test]
    fn unknown_compression_fails_at_construction() {
        let (connector, _source) = transport(1);
        let config = SenderConfig {
            data_header_compression: Some("bogus".to_string()),
            ..SenderConfig::default()
        };
        let err = Sender::new(connector.clone(), config).err().unwrap();
        assert!(matches!(err, ProtocolError::Configuration(_)));

        let config = SenderConfig {
            data_compression: Some("bogus".to_string()),
            ..SenderConfig::default()
        };
        let err = Sender::new(connector, config).err().unwrap();
        assert!(matches!(err, ProtocolError::Configuration(_)));
    }

    #[test]
    fn timeout_leaves_counter_untouched() {
        let (connector, _source) = transport(1);
        let sender = Sender::new(connector, SenderConfig::default()).unwrap();
        sender.open().unwrap();

        sender.send(SendOptions::default()).unwrap();
        let err = sender.send(SendOptions::default()).unwrap_err();
        assert!(matches!(err, ProtocolError::SendTimeout(_)));
        assert_eq!(sender.pulse_id(), 1);
    }

    #[test]
    fn codec_failure_sends_nothing() {
        let (sender, mut source) = sender(0);
        sender
            .register(
                "bad",
                Some(value_source(|_| Some(Value::from("text")))),
                ChannelMetadata::default(),
            )
            .unwrap();
        sender.open().unwrap();

        let err = sender.send(SendOptions::default()).unwrap_err();
        assert!(matches!(err, ProtocolError::Codec { .. }));
        assert_eq!(sender.pulse_id(), 0);
        assert!(source.try_recv_multipart().unwrap().is_none());
    }

    #[test]
    fn close_twice_reports_transport_error() {
        let (sender, _source) = sender(0);
        assert!(matches!(sender.close(), Err(ProtocolError::InvalidState(_))));

        sender.open().unwrap();
        sender.close().unwrap();
        assert_eq!(sender.state(), SenderState::Closed);
        assert!(matches!(
            sender.close(),
            Err(ProtocolError::Transport(TransportError::Shutdown))
        ));
    }

    #[test]
    fn reopen_keeps_channels_and_counter() {
        let (sender, _source) = sender(3);
        sender
            .register("a", None, ChannelMetadata::default())
            .unwrap();
        sender.open().unwrap();
        sender.send(SendOptions::default()).unwrap();
        sender.close().unwrap();

        sender.open().unwrap();
        assert_eq!(sender.pulse_id(), 4);
        assert_eq!(sender.channel_names(), vec!["a"]);

        sender.reset_pulse_id();
        assert_eq!(sender.pulse_id(), 3);
    }

    #[test]
    fn hooks_run_around_the_send() {
        let (sender, mut source) = sender(0);
        sender.open().unwrap();

        sender.set_pre_send_hook(|registry| {
            if registry.get("added").is_none() {
                registry.register("added", None, ChannelMetadata::default())?;
            }
            Ok(())
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        sender.set_post_send_hook(move |pulse_id| {
            record.lock().unwrap().push(pulse_id);
            Ok(())
        });

        sender.send(SendOptions::default()).unwrap();
        assert_eq!(source.recv_multipart().unwrap().len(), 4);
        assert_eq!(*seen.lock().unwrap(), vec![0]);
    }

    #[test]
    fn failing_pre_hook_aborts_the_send() {
        let (sender, mut source) = sender(0);
        sender.open().unwrap();
        sender.set_pre_send_hook(|_| Err("not ready".into()));

        let err = sender.send(SendOptions::default()).unwrap_err();
        assert!(matches!(err, ProtocolError::Hook(_)));
        assert_eq!(sender.pulse_id(), 0);
        assert!(source.try_recv_multipart().unwrap().is_none());
    }

    #[test]
    fn failing_post_hook_keeps_the_send() {
        let (sender, mut source) = sender(0);
        sender.open().unwrap();
        sender.set_post_send_hook(|_| Err("observer failed".into()));

        let err = sender.send(SendOptions::default()).unwrap_err();
        assert!(matches!(err, ProtocolError::PostSendHook { pulse_id: 0, .. }));
        assert_eq!(sender.pulse_id(), 1);
        assert!(source.try_recv_multipart().unwrap().is_some());
    }

    #[test]
    fn generate_stream_sends_then_closes() {
        let (sender, mut source) = sender(10);
        sender
            .register(
                "counter",
                Some(value_source(|pulse_id| Some(Value::from(pulse_id)))),
                ChannelMetadata::default().with_type(DataType::Uint64),
            )
            .unwrap();

        let stop = AtomicBool::new(false);
        let sent = sender
            .generate_stream(Some(3), Duration::ZERO, &stop)
            .unwrap();
        assert_eq!(sent, 3);
        assert_eq!(sender.state(), SenderState::Closed);

        let pulses: Vec<u64> = (0..3)
            .map(|_| main_header(&source.recv_multipart().unwrap()).pulse_id)
            .collect();
        assert_eq!(pulses, vec![10, 11, 12]);
    }

    #[test]
    fn generate_stream_stops_on_request() {
        let (sender, _source) = sender(0);
        let stop = AtomicBool::new(true);
        let sent = sender.generate_stream(None, Duration::ZERO, &stop).unwrap();
        assert_eq!(sent, 0);
        assert_eq!(sender.state(), SenderState::Closed);
    }

    #[test]
    fn sender_is_shareable_across_threads() {
        let (sender, mut source) = sender(0);
        let sender = Arc::new(sender);
        sender.open().unwrap();

        let registrar = {
            let sender = Arc::clone(&sender);
            std::thread::spawn(move || {
                for index in 0..10 {
                    sender
                        .register(format!("c{index}"), None, ChannelMetadata::default())
                        .unwrap();
                }
            })
        };
        for _ in 0..10 {
            sender.send(SendOptions::default()).unwrap();
        }
        registrar.join().unwrap();

        for _ in 0..10 {
            let message = source.recv_multipart().unwrap();
            let decoded = decode_message(
                &message,
                &mut HeaderCache::new(),
                &CompressionRegistry::default(),
            )
            .unwrap();
            assert_eq!(message.len(), 2 + 2 * decoded.data_header.channels.len());
        }
    }
}

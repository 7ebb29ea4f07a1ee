//! Property tests for the message construction rules and the consistency
//! checker.

use std::time::Duration;

use bsread_protocol::{
    build_data_header, frame_count, value, ByteOrder, ChannelMetadata, ChannelRegistry,
    CompressionRegistry, ConsistencyChecker, DataType, SendOptions, Sender, SenderConfig, Value,
};
use bsread_transport::memory::{channel, MemoryConnector, MemorySource};
use bsread_transport::{MultipartSource, TransportConfig};
use proptest::prelude::*;

fn data_type() -> impl Strategy<Value = DataType> {
    prop::sample::select(DataType::ALL.to_vec())
}

fn byte_order() -> impl Strategy<Value = ByteOrder> {
    prop_oneof![Just(ByteOrder::Little), Just(ByteOrder::Big)]
}

/// (channel name index, type, shape, byte order)
fn registration() -> impl Strategy<Value = (u8, DataType, Vec<u32>, ByteOrder)> {
    (
        0..6u8,
        data_type(),
        prop::collection::vec(1..5u32, 1..3),
        byte_order(),
    )
}

fn replay(registrations: &[(u8, DataType, Vec<u32>, ByteOrder)]) -> ChannelRegistry {
    let mut registry = ChannelRegistry::new(CompressionRegistry::default(), None).unwrap();
    for (index, data_type, shape, order) in registrations {
        registry
            .register(
                format!("channel-{index}"),
                None,
                ChannelMetadata::default()
                    .with_type(*data_type)
                    .with_shape(shape.clone())
                    .with_byte_order(*order),
            )
            .unwrap();
    }
    registry
}

fn memory_sender(start_pulse_id: u64) -> (Sender<MemoryConnector>, MemorySource) {
    let (connector, source) = channel(&TransportConfig {
        queue_size: 256,
        receive_timeout: Some(Duration::from_millis(200)),
        ..TransportConfig::default()
    });
    let sender = Sender::new(
        connector,
        SenderConfig::default().with_start_pulse_id(start_pulse_id),
    )
    .unwrap();
    (sender, source)
}

proptest! {
    #[test]
    fn prop_data_header_is_deterministic(
        registrations in prop::collection::vec(registration(), 0..12)
    ) {
        let first = build_data_header(&replay(&registrations), None).unwrap();
        let second = build_data_header(&replay(&registrations), None).unwrap();
        prop_assert_eq!(&first.bytes, &second.bytes);
        prop_assert_eq!(first.hash, second.hash);
    }

    #[test]
    fn prop_message_has_two_frames_per_channel(
        present in prop::collection::vec(any::<bool>(), 0..16)
    ) {
        let (sender, mut source) = memory_sender(0);
        for index in 0..present.len() {
            sender
                .register(format!("c{index}"), None, ChannelMetadata::default())
                .unwrap();
        }
        sender.open().unwrap();

        let values = present
            .iter()
            .enumerate()
            .map(|(index, present)| present.then(|| Value::from(index as f64)))
            .collect();
        sender.send(SendOptions::default().positional(values)).unwrap();

        let message = source.recv_multipart().unwrap();
        prop_assert_eq!(message.len(), frame_count(present.len()));
        for (index, present) in present.iter().enumerate() {
            let value_frame = &message[2 + 2 * index];
            let timestamp_frame = &message[3 + 2 * index];
            prop_assert_eq!(value_frame.is_empty(), !present);
            prop_assert_eq!(timestamp_frame.len(), if *present { 16 } else { 0 });
        }
    }

    #[test]
    fn prop_counter_ignores_overrides(
        start in 0..1_000_000u64,
        overrides in prop::collection::vec(prop::option::of(any::<u64>()), 0..20)
    ) {
        let (sender, _source) = memory_sender(start);
        sender.open().unwrap();
        for pulse_id in &overrides {
            let mut options = SendOptions::default();
            options.pulse_id = *pulse_id;
            sender.send(options).unwrap();
        }
        prop_assert_eq!(sender.pulse_id(), start + overrides.len() as u64);
    }

    #[test]
    fn prop_checker_adopts_the_maximum(
        pulses in prop::collection::vec(0..200u64, 1..60)
    ) {
        let mut checker = ConsistencyChecker::new();
        for pulse_id in &pulses {
            checker.observe(*pulse_id);
        }
        prop_assert_eq!(checker.last_pulse_id(), pulses.iter().max().copied());

        let statistics = checker.statistics();
        let observed = 1 + statistics.duplicated + statistics.reverted;
        prop_assert!(observed <= pulses.len() as u64);
    }

    #[test]
    fn prop_increasing_sequence_counts_exact_gaps(
        mut pulses in prop::collection::btree_set(0..10_000u64, 1..50)
            .prop_map(|set| set.into_iter().collect::<Vec<_>>())
    ) {
        let mut checker = ConsistencyChecker::new();
        for pulse_id in &pulses {
            checker.observe(*pulse_id);
        }
        let first = pulses.remove(0);
        let last = pulses.last().copied().unwrap_or(first);
        let statistics = checker.statistics();
        prop_assert_eq!(statistics.missed, last - first - pulses.len() as u64);
        prop_assert_eq!(statistics.duplicated, 0);
        prop_assert_eq!(statistics.reverted, 0);
    }

    #[test]
    fn prop_float64_round_trips_bitwise(
        elements in prop::collection::vec(any::<f64>(), 1..32),
        order in byte_order()
    ) {
        let shape = vec![elements.len() as u32];
        let encoded = value::encode(&Value::from(elements.clone()), DataType::Float64, &shape, order).unwrap();
        let decoded = value::decode(&encoded, DataType::Float64, &shape, order).unwrap();

        let bits: Vec<u64> = match &decoded {
            Value::Scalar(scalar) => vec![scalar.as_f64().to_bits()],
            Value::Array(array) => (0..array.len())
                .filter_map(|index| array.data().get(index))
                .map(|scalar| scalar.as_f64().to_bits())
                .collect(),
            Value::String(_) => Vec::new(),
        };
        let expected: Vec<u64> = elements.iter().map(|element| element.to_bits()).collect();
        prop_assert_eq!(bits, expected);
    }
}

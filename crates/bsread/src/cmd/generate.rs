use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use bsread_protocol::{
    value_source, ByteOrder, ChannelMetadata, DataType, Sender, SenderConfig, Value,
};
use bsread_stream::StreamConnector;
use bsread_transport::TransportConfig;
use serde::Serialize;
use tracing::info;

use crate::cmd::{install_ctrlc_handler, parse_duration, GenerateArgs};
use crate::exit::{protocol_error, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct GenerateSummary {
    address: String,
    mode: String,
    messages_sent: u64,
    next_pulse_id: u64,
}

pub fn run(args: GenerateArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let byte_order = if args.big_endian {
        ByteOrder::Big
    } else {
        ByteOrder::native()
    };

    let transport = TransportConfig {
        address: args.address.clone(),
        mode: args.mode.into(),
        conn_type: args.conn.into(),
        queue_size: args.queue,
        ..TransportConfig::default()
    };
    let sender = Sender::new(
        StreamConnector::new(transport.clone()),
        SenderConfig::default().with_start_pulse_id(args.start_pulse_id),
    )
    .map_err(|err| protocol_error("sender setup failed", err))?;

    for index in 0..args.channels {
        let offset = index as f64;
        sender
            .register(
                format!("SCALAR{index}"),
                Some(value_source(move |pulse_id| {
                    Some(Value::from(pulse_id as f64 + offset))
                })),
                ChannelMetadata::default()
                    .with_type(DataType::Float64)
                    .with_byte_order(byte_order),
            )
            .map_err(|err| protocol_error("channel setup failed", err))?;
    }
    if args.array_size > 0 {
        let size = args.array_size;
        sender
            .register(
                "WAVEFORM",
                Some(value_source(move |pulse_id| {
                    let samples: Vec<f64> = (0..size)
                        .map(|sample| ((pulse_id + u64::from(sample)) as f64 * 0.1).sin())
                        .collect();
                    Some(Value::from(samples))
                })),
                ChannelMetadata::default()
                    .with_type(DataType::Float64)
                    .with_shape(vec![size])
                    .with_byte_order(byte_order),
            )
            .map_err(|err| protocol_error("channel setup failed", err))?;
    }

    let stop = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(stop.clone())?;

    info!(
        address = %transport.address,
        mode = %transport.mode,
        channels = sender.channel_names().len(),
        "generating stream"
    );
    let sent = sender
        .generate_stream(args.count, interval, &stop)
        .map_err(|err| protocol_error("stream generation failed", err))?;

    let summary = GenerateSummary {
        address: transport.address,
        mode: transport.mode.to_string(),
        messages_sent: sent,
        next_pulse_id: sender.pulse_id(),
    };
    match format {
        OutputFormat::Json => print_json(&summary),
        OutputFormat::Table | OutputFormat::Pretty => println!(
            "sent {} messages to {} ({}), next pulse id {}",
            summary.messages_sent, summary.address, summary.mode, summary.next_pulse_id
        ),
    }
    Ok(SUCCESS)
}

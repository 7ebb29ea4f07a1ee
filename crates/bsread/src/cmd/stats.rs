use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bsread_protocol::{ProtocolError, Receiver};
use bsread_stream::InboundStream;
use bsread_transport::{ConnType, Endpoint, TransportConfig, TransportError};
use tracing::{info, warn};

use crate::cmd::{install_ctrlc_handler, StatsArgs};
use crate::exit::{protocol_error, transport_error, CliResult, SUCCESS};
use crate::output::{clear_screen, print_stats, print_values, OutputFormat, StatsReport};

// Receives wake up this often to notice Ctrl-C.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn run(args: StatsArgs, format: OutputFormat) -> CliResult<i32> {
    let endpoint =
        Endpoint::normalize(&args.source).map_err(|err| transport_error("invalid source", err))?;

    let config = TransportConfig {
        address: endpoint.to_string(),
        mode: args.mode.into(),
        conn_type: ConnType::Connect,
        queue_size: args.queue,
        receive_timeout: Some(POLL_INTERVAL),
        ..TransportConfig::default()
    };
    let stream =
        InboundStream::open(&config).map_err(|err| transport_error("connect failed", err))?;
    let mut receiver = Receiver::new(stream);

    let stop = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(stop.clone())?;

    let started = Instant::now();
    let mut reported = 0u64;

    while !stop.load(Ordering::SeqCst) {
        let message = match receiver.receive() {
            Ok(message) => Some(message),
            Err(ProtocolError::Transport(TransportError::ReceiveTimeout(_))) => continue,
            Err(ProtocolError::Transport(TransportError::Shutdown)) => {
                info!(source = %endpoint, "source disconnected");
                break;
            }
            Err(ProtocolError::Decode(reason)) => {
                warn!(%reason, "undecodable message");
                None
            }
            Err(err) => return Err(protocol_error("receive failed", err)),
        };

        let received = receiver.messages_received();
        if report_due(received, args.n) {
            if args.clear {
                clear_screen();
            }
            if let (true, Some(message)) = (args.values, &message) {
                print_values(message, format);
            }
            print_stats(&report(&receiver, started), format);
            reported = received;
        }

        if args.count.is_some_and(|count| received >= count) {
            break;
        }
    }

    if reported != receiver.messages_received() {
        print_stats(&report(&receiver, started), format);
    }
    Ok(SUCCESS)
}

/// Report on the 1st, (n+1)th, (2n+1)th ... message; `n == 0` never reports.
fn report_due(received: u64, n: u64) -> bool {
    n > 0 && received > 0 && (received - 1) % n == 0
}

fn report(receiver: &Receiver<InboundStream>, started: Instant) -> StatsReport {
    StatsReport::new(
        receiver.messages_received(),
        receiver.bytes_received(),
        receiver.statistics(),
        receiver.checker().last_pulse_id(),
        started.elapsed().as_secs_f64(),
    )
}

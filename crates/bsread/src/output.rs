use std::io::{IsTerminal, Write};

use bsread_protocol::{ChannelValue, DecodedMessage, Statistics};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Counters reported by `bsread stats`.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub messages_received: u64,
    pub message_rate: f64,
    pub bytes_received: u64,
    pub receive_rate: f64,
    pub missed: u64,
    pub duplicated: u64,
    pub reverted: u64,
    pub last_pulse_id: Option<u64>,
    pub elapsed_seconds: f64,
}

impl StatsReport {
    pub fn new(
        messages_received: u64,
        bytes_received: u64,
        statistics: Statistics,
        last_pulse_id: Option<u64>,
        elapsed_seconds: f64,
    ) -> Self {
        let rate = |count: u64| {
            if elapsed_seconds > 0.0 {
                count as f64 / elapsed_seconds
            } else {
                0.0
            }
        };
        Self {
            messages_received,
            message_rate: rate(messages_received),
            bytes_received,
            receive_rate: rate(bytes_received),
            missed: statistics.missed,
            duplicated: statistics.duplicated,
            reverted: statistics.reverted,
            last_pulse_id,
            elapsed_seconds,
        }
    }
}

pub fn print_stats(report: &StatsReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["STATISTIC", "VALUE"])
                .add_row(vec![
                    "messages received".to_string(),
                    report.messages_received.to_string(),
                ])
                .add_row(vec![
                    "message rate".to_string(),
                    format!("{:.2} Hz", report.message_rate),
                ])
                .add_row(vec![
                    "data received".to_string(),
                    format_bytes(report.bytes_received as f64),
                ])
                .add_row(vec![
                    "receive rate".to_string(),
                    format!("{}/s", format_bytes(report.receive_rate)),
                ])
                .add_row(vec!["missed pulse ids".to_string(), report.missed.to_string()])
                .add_row(vec![
                    "duplicated pulse ids".to_string(),
                    report.duplicated.to_string(),
                ])
                .add_row(vec![
                    "reverted pulse ids".to_string(),
                    report.reverted.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "messages={} rate={:.2}Hz data={} throughput={}/s missed={} duplicated={} reverted={}",
                report.messages_received,
                report.message_rate,
                format_bytes(report.bytes_received as f64),
                format_bytes(report.receive_rate),
                report.missed,
                report.duplicated,
                report.reverted
            );
        }
    }
}

#[derive(Serialize)]
struct ChannelOutput<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    data_type: &'a str,
    shape: &'a [u32],
    value: String,
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    pulse_id: u64,
    global_timestamp: f64,
    channels: Vec<ChannelOutput<'a>>,
}

/// Print the channel values of one message.
pub fn print_values(message: &DecodedMessage, format: OutputFormat) {
    let channels: Vec<ChannelOutput<'_>> = message
        .data_header
        .channels
        .iter()
        .zip(&message.channels)
        .map(|(metadata, channel)| ChannelOutput {
            name: &channel.name,
            data_type: metadata.data_type.as_str(),
            shape: &metadata.shape,
            value: value_preview(&channel.value),
        })
        .collect();

    match format {
        OutputFormat::Json => {
            let timestamp = &message.main_header.global_timestamp;
            print_json(&MessageOutput {
                pulse_id: message.pulse_id(),
                global_timestamp: timestamp.sec as f64 + timestamp.ns as f64 * 1e-9,
                channels,
            });
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "TYPE", "SHAPE", "VALUE"]);
            for channel in channels {
                table.add_row(vec![
                    channel.name.to_string(),
                    channel.data_type.to_string(),
                    format!("{:?}", channel.shape),
                    channel.value,
                ]);
            }
            println!("pulse_id: {}", message.pulse_id());
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("pulse_id={}", message.pulse_id());
            for channel in channels {
                println!("  {} ({}) = {}", channel.name, channel.data_type, channel.value);
            }
        }
    }
}

pub fn clear_screen() {
    let mut out = std::io::stdout();
    let _ = out.write_all(b"\x1b[2J\x1b[H");
    let _ = out.flush();
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn value_preview(value: &ChannelValue) -> String {
    match value {
        ChannelValue::Missing => "-".to_string(),
        ChannelValue::Value(value) => value.to_string(),
        ChannelValue::Error(message) => format!("<error: {message}>"),
    }
}

fn format_bytes(bytes: f64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes;
    let mut unit = 0;
    while size >= 1000.0 && unit < UNITS.len() - 1 {
        size /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{size:.0} {}", UNITS[unit])
    } else {
        format!("{size:.2} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_byte_counts() {
        assert_eq!(format_bytes(512.0), "512 B");
        assert_eq!(format_bytes(1_500.0), "1.50 KB");
        assert_eq!(format_bytes(2_000_000.0), "2.00 MB");
    }

    #[test]
    fn rates_are_zero_before_time_passes() {
        let report = StatsReport::new(10, 100, Statistics::default(), Some(9), 0.0);
        assert_eq!(report.message_rate, 0.0);
        assert_eq!(report.receive_rate, 0.0);

        let report = StatsReport::new(10, 100, Statistics::default(), Some(9), 2.0);
        assert_eq!(report.message_rate, 5.0);
        assert_eq!(report.receive_rate, 50.0);
    }

    #[test]
    fn missing_values_render_as_dash() {
        assert_eq!(value_preview(&ChannelValue::Missing), "-");
        assert_eq!(
            value_preview(&ChannelValue::Error("short frame".to_string())),
            "<error: short frame>"
        );
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bsread_transport::{ConnType, Mode};
use clap::{Args, Subcommand, ValueEnum};

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod generate;
pub mod stats;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a synthetic test stream.
    Generate(GenerateArgs),
    /// Receive a stream and report pulse ID statistics.
    Stats(StatsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Generate(args) => generate::run(args, format),
        Command::Stats(args) => stats::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum SendMode {
    Push,
    Pub,
}

impl From<SendMode> for Mode {
    fn from(mode: SendMode) -> Self {
        match mode {
            SendMode::Push => Mode::Push,
            SendMode::Pub => Mode::Pub,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReceiveMode {
    Pull,
    Sub,
}

impl From<ReceiveMode> for Mode {
    fn from(mode: ReceiveMode) -> Self {
        match mode {
            ReceiveMode::Pull => Mode::Pull,
            ReceiveMode::Sub => Mode::Sub,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Conn {
    Bind,
    Connect,
}

impl From<Conn> for ConnType {
    fn from(conn: Conn) -> Self {
        match conn {
            Conn::Bind => ConnType::Bind,
            Conn::Connect => ConnType::Connect,
        }
    }
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Address to bind or connect.
    #[arg(long, default_value = "tcp://*:9999")]
    pub address: String,
    /// Socket mode.
    #[arg(long, value_enum, default_value = "push")]
    pub mode: SendMode,
    /// Bind the address or connect to it.
    #[arg(long, value_enum, default_value = "bind")]
    pub conn: Conn,
    /// Stop after N messages. Default: run until interrupted.
    #[arg(long)]
    pub count: Option<u64>,
    /// Delay between messages (e.g. 10ms, 1s).
    #[arg(long, default_value = "10ms")]
    pub interval: String,
    /// First pulse ID.
    #[arg(long, default_value = "0")]
    pub start_pulse_id: u64,
    /// Number of scalar channels.
    #[arg(long, default_value = "3")]
    pub channels: usize,
    /// Element count of the waveform channel (0 omits it).
    #[arg(long, default_value = "16")]
    pub array_size: u32,
    /// Encode values big-endian instead of the native byte order.
    #[arg(long)]
    pub big_endian: bool,
    /// Send queue size in messages.
    #[arg(long, default_value = "10")]
    pub queue: usize,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Source address; `tcp://` and port 9999 are added when missing.
    pub source: String,
    /// Socket mode.
    #[arg(long, value_enum, default_value = "pull")]
    pub mode: ReceiveMode,
    /// Receive queue size in messages.
    #[arg(long, default_value = "100")]
    pub queue: usize,
    /// Print statistics every N messages (0 disables periodic output).
    #[arg(short = 'n', default_value = "1")]
    pub n: u64,
    /// Show the channel values of each reported message.
    #[arg(long)]
    pub values: bool,
    /// Clear the screen before each report.
    #[arg(long)]
    pub clear: bool,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<u64>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `2s` or a bare number of milliseconds.
pub(crate) fn parse_duration(value: &str) -> CliResult<Duration> {
    let value = value.trim();
    let invalid = || CliError::new(USAGE, format!("invalid duration '{value}'"));

    if let Some(ms) = value.strip_suffix("ms") {
        return ms.trim().parse::<u64>().map(Duration::from_millis).map_err(|_| invalid());
    }
    if let Some(secs) = value.strip_suffix('s') {
        return secs
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .ok_or_else(invalid);
    }
    value.parse::<u64>().map(Duration::from_millis).map_err(|_| invalid())
}

/// Set `stop` on Ctrl-C.
pub(crate) fn install_ctrlc_handler(stop: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

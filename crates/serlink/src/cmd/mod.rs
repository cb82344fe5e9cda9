use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod loopback;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a payload as one wire frame.
    Encode(EncodeArgs),
    /// Decode frames from a captured byte stream.
    Decode(DecodeArgs),
    /// Send frames across a simulated serial line and report what arrived.
    Loopback(LoopbackArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Loopback(args) => loopback::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Payload as hex bytes (e.g. "01 02 f7").
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "hex"])]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// File holding the captured bytes. Reads stdin when omitted or "-".
    pub input: Option<PathBuf>,
    /// Treat the input as hex text instead of raw bytes.
    #[arg(long)]
    pub hex: bool,
    /// Feed the decoder this many bytes at a time.
    #[arg(long, default_value_t = 16, value_parser = clap::value_parser!(u16).range(1..))]
    pub chunk: u16,
    /// Receive buffer size in bytes.
    #[arg(long, env = "SERLINK_BUFFER_CAPACITY", default_value_t = serlink_frame::DEFAULT_BUFFER_CAPACITY)]
    pub buffer_capacity: usize,
    /// Exit with status 60 if any frame was discarded.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct LoopbackArgs {
    /// Number of frames to send.
    #[arg(long, default_value_t = 16)]
    pub count: usize,
    /// Payload size of each frame in bytes.
    #[arg(long, default_value_t = 32)]
    pub size: usize,
    /// Flip a bit in every Nth byte on the line (0 = clean line).
    #[arg(long, default_value_t = 0)]
    pub corrupt_every: u64,
    /// Receive buffer size of each transport.
    #[arg(long, env = "SERLINK_RX_CAPACITY", default_value_t = 64)]
    pub rx_capacity: usize,
    /// Transmit buffer size of each transport.
    #[arg(long, env = "SERLINK_TX_CAPACITY", default_value_t = 64)]
    pub tx_capacity: usize,
    /// Give up after this long (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use netsdr_codec::config::parse_hex_byte;

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;
use crate::settings::Settings;

pub mod capture;
pub mod console;
pub mod frequency;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Interactive menu: connect, start/stop I/Q, change frequency.
    Console(ConsoleArgs),
    /// Start the receiver and record I/Q payloads to a file.
    Capture(CaptureArgs),
    /// Tune the receiver to a frequency.
    Frequency(FrequencyArgs),
    /// Run a simulated receiver on loopback.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, settings: &Settings, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Console(args) => console::run(args, settings),
        Command::Capture(args) => capture::run(args, settings, format),
        Command::Frequency(args) => frequency::run(args, settings, format),
        Command::Simulate(args) => simulate::run(args, settings, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ConsoleArgs {
    /// File receiving I/Q payloads.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// How long to capture (e.g. 10s, 500ms, 2m).
    #[arg(long, short = 'd', default_value = "10s")]
    pub duration: String,
    /// File receiving I/Q payloads.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
    /// Tune to this frequency (Hz) before starting.
    #[arg(long, allow_negative_numbers = true)]
    pub frequency: Option<i64>,
    /// Accept telemetry from any source address.
    #[arg(long)]
    pub any_source: bool,
    /// Leave datagrams queued in the socket while the receiver is off.
    #[arg(long)]
    pub park_when_idle: bool,
    /// How long to wait for each command response.
    #[arg(long, default_value = "5s")]
    pub response_timeout: String,
}

#[derive(Args, Debug)]
pub struct FrequencyArgs {
    /// Frequency in Hz.
    #[arg(allow_negative_numbers = true)]
    pub hz: i64,
    /// Channel id: 0x00 (channel 1), 0x02 (channel 2), 0xFF (all).
    #[arg(long, short = 'c', value_parser = parse_channel)]
    pub channel: Option<u8>,
    /// How long to wait for the response.
    #[arg(long, default_value = "5s")]
    pub response_timeout: String,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Delay between telemetry datagrams while running.
    #[arg(long, default_value = "10ms")]
    pub interval: String,
    /// I/Q payload bytes per datagram.
    #[arg(long, default_value = "1024")]
    pub payload_len: usize,
    /// Stop after this long instead of waiting for Ctrl-C.
    #[arg(long)]
    pub duration: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_channel(input: &str) -> Result<u8, String> {
    parse_hex_byte(input).map_err(|err| format!("invalid channel id '{input}': {err}"))
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
    } else if let Some(num) = input.strip_suffix('m') {
        (num, "m")
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
        "s" => Ok(Duration::from_secs(value)),
        _ => Ok(Duration::from_secs(value.saturating_mul(60))),
    }
}

/// Flag cleared by Ctrl-C.
pub(crate) fn install_ctrlc_handler() -> CliResult<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    Ok(running)
}

/// Sleep until `limit` elapses or `running` is cleared.
pub(crate) fn wait_while_running(running: &AtomicBool, limit: Option<Duration>) {
    let start = std::time::Instant::now();
    while running.load(Ordering::SeqCst) {
        if limit.is_some_and(|limit| start.elapsed() >= limit) {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

use std::path::PathBuf;

use netsdr_codec::{encode_frequency, FrequencyConfig};
use netsdr_session::{Session, SessionConfig};

use crate::cmd::{parse_duration, FrequencyArgs};
use crate::exit::{session_error, validation_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_report, CommandOutcome, OutputFormat};
use crate::settings::Settings;

#[cfg(windows)]
const NULL_DEVICE: &str = "NUL";
#[cfg(not(windows))]
const NULL_DEVICE: &str = "/dev/null";

pub fn run(args: FrequencyArgs, settings: &Settings, format: OutputFormat) -> CliResult<i32> {
    let cfg = args
        .channel
        .map(FrequencyConfig::channel)
        .unwrap_or(settings.frequency);
    // Reject bad parameters before touching the network.
    let command =
        encode_frequency(args.hz, &cfg).map_err(|err| validation_error("invalid frequency", err))?;

    let config = SessionConfig {
        response_timeout: parse_duration(&args.response_timeout)?,
        // Tuning never starts the receiver; keep any previous capture intact.
        output_path: PathBuf::from(NULL_DEVICE),
        ..SessionConfig::default()
    };
    let mut session = Session::with_config(config);
    session
        .connect(&settings.host, settings.tcp_port, settings.udp_port)
        .map_err(|err| session_error("connect failed", err))?;

    let response = session
        .set_frequency(args.hz, &cfg)
        .map_err(|err| session_error("set frequency failed", err))?;
    session
        .disconnect()
        .map_err(|err| session_error("disconnect failed", err))?;

    print_report(&CommandOutcome::new("frequency", &command, &response), format);
    Ok(if response.is_ack() { SUCCESS } else { FAILURE })
}

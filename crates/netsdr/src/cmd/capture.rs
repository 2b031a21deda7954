use std::path::PathBuf;
use std::time::Instant;

use netsdr_codec::Response;
use netsdr_session::{IdlePolicy, Session, SessionConfig, SessionSummary, DEFAULT_OUTPUT_FILE};
use serde::Serialize;
use tracing::{info, warn};

use crate::cmd::{install_ctrlc_handler, parse_duration, wait_while_running, CaptureArgs};
use crate::exit::{session_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_report, OutputFormat, Report};
use crate::settings::Settings;

#[derive(Debug, Serialize)]
struct CaptureReport {
    host: String,
    tcp_port: u16,
    udp_port: u16,
    output: String,
    duration_ms: u128,
    frequency_hz: Option<i64>,
    start_response: String,
    stop_response: String,
    packets: u64,
    bytes_written: u64,
    short_packets: u64,
    foreign_packets: u64,
    idle_dropped: u64,
    unsolicited_messages: u64,
}

impl CaptureReport {
    fn new(
        settings: &Settings,
        output: &std::path::Path,
        elapsed_ms: u128,
        frequency_hz: Option<i64>,
        responses: (&Response, &Response),
        summary: &SessionSummary,
    ) -> Self {
        Self {
            host: settings.host.clone(),
            tcp_port: settings.tcp_port,
            udp_port: settings.udp_port,
            output: output.display().to_string(),
            duration_ms: elapsed_ms,
            frequency_hz,
            start_response: responses.0.to_string(),
            stop_response: responses.1.to_string(),
            packets: summary.telemetry.packets,
            bytes_written: summary.telemetry.bytes_written,
            short_packets: summary.telemetry.short_packets,
            foreign_packets: summary.telemetry.foreign_packets,
            idle_dropped: summary.telemetry.idle_dropped,
            unsolicited_messages: summary.listener.pushes,
        }
    }
}

impl Report for CaptureReport {
    fn rows(&self) -> Vec<(&'static str, String)> {
        let mut rows = vec![
            ("device", format!("{}:{}", self.host, self.tcp_port)),
            ("telemetry port", self.udp_port.to_string()),
            ("output", self.output.clone()),
            ("duration", format!("{}ms", self.duration_ms)),
        ];
        if let Some(hz) = self.frequency_hz {
            rows.push(("frequency", format!("{hz} Hz")));
        }
        rows.extend([
            ("start", self.start_response.clone()),
            ("stop", self.stop_response.clone()),
            ("packets", self.packets.to_string()),
            ("bytes written", self.bytes_written.to_string()),
            ("short packets", self.short_packets.to_string()),
            ("foreign packets", self.foreign_packets.to_string()),
            ("idle dropped", self.idle_dropped.to_string()),
            ("unsolicited", self.unsolicited_messages.to_string()),
        ]);
        rows
    }
}

pub fn run(args: CaptureArgs, settings: &Settings, format: OutputFormat) -> CliResult<i32> {
    let duration = parse_duration(&args.duration)?;
    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_FILE));
    let config = SessionConfig {
        response_timeout: parse_duration(&args.response_timeout)?,
        output_path: output.clone(),
        idle_policy: if args.park_when_idle {
            IdlePolicy::Park
        } else {
            IdlePolicy::Drop
        },
        filter_telemetry_source: !args.any_source,
        ..SessionConfig::default()
    };
    let running = install_ctrlc_handler()?;

    let mut session = Session::with_config(config);
    session
        .connect(&settings.host, settings.tcp_port, settings.udp_port)
        .map_err(|err| session_error("connect failed", err))?;

    if let Some(hz) = args.frequency {
        let response = session
            .set_frequency(hz, &settings.frequency)
            .map_err(|err| session_error("set frequency failed", err))?;
        if !response.is_ack() {
            warn!(%response, "device did not accept the frequency");
        }
    }

    let start = session
        .toggle_receiver_state(true, &settings.receiver)
        .map_err(|err| session_error("start failed", err))?;
    let started = Instant::now();
    info!(duration_ms = duration.as_millis() as u64, "capturing");

    if start.is_ack() {
        wait_while_running(&running, Some(duration));
    } else {
        warn!(response = %start, "device did not start streaming");
    }

    let stop = session
        .toggle_receiver_state(false, &settings.receiver)
        .map_err(|err| session_error("stop failed", err))?;
    let elapsed_ms = started.elapsed().as_millis();
    let summary = session
        .disconnect()
        .map_err(|err| session_error("disconnect failed", err))?;

    let report = CaptureReport::new(
        settings,
        &output,
        elapsed_ms,
        args.frequency,
        (&start, &stop),
        &summary,
    );
    print_report(&report, format);
    Ok(if start.is_ack() { SUCCESS } else { FAILURE })
}

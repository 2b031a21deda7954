use std::net::{SocketAddr, ToSocketAddrs};

use netsdr_session::{DeviceSimulator, SimulatorConfig};
use serde::Serialize;

use crate::cmd::{install_ctrlc_handler, parse_duration, wait_while_running, SimulateArgs};
use crate::exit::{transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_report, OutputFormat, Report};
use crate::settings::Settings;

#[derive(Debug, Serialize)]
struct SimulatorReport {
    control_addr: String,
    telemetry_target: String,
    packets_sent: u64,
    commands_received: usize,
}

impl Report for SimulatorReport {
    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("control", self.control_addr.clone()),
            ("telemetry target", self.telemetry_target.clone()),
            ("packets sent", self.packets_sent.to_string()),
            ("commands received", self.commands_received.to_string()),
        ]
    }
}

pub fn run(args: SimulateArgs, settings: &Settings, format: OutputFormat) -> CliResult<i32> {
    let packet_interval = parse_duration(&args.interval)?;
    let limit = args.duration.as_deref().map(parse_duration).transpose()?;
    let control_addr = resolve(&settings.host, settings.tcp_port)?;
    let telemetry_target = resolve(&settings.host, settings.udp_port)?;

    let running = install_ctrlc_handler()?;
    let simulator = DeviceSimulator::start(SimulatorConfig {
        control_addr,
        telemetry_target: Some(telemetry_target),
        packet_interval,
        payload_len: args.payload_len,
        ..SimulatorConfig::default()
    })
    .map_err(|err| transport_error("simulator failed to start", err))?;

    eprintln!(
        "Simulating NetSDR receiver on {} (telemetry to {telemetry_target})",
        simulator.control_addr()
    );
    wait_while_running(&running, limit);

    let report = SimulatorReport {
        control_addr: simulator.control_addr().to_string(),
        telemetry_target: telemetry_target.to_string(),
        packets_sent: simulator.packets_sent(),
        commands_received: simulator.received().len(),
    };
    simulator.stop();

    print_report(&report, format);
    Ok(SUCCESS)
}

fn resolve(host: &str, port: u16) -> CliResult<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .map_err(|err| CliError::new(USAGE, format!("cannot resolve {host}:{port}: {err}")))?
        .next()
        .ok_or_else(|| CliError::new(USAGE, format!("no address for {host}:{port}")))
}

mod cmd;
mod exit;
mod logging;
mod output;
mod settings;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;
use crate::settings::{Overrides, Settings};

#[derive(Parser, Debug)]
#[command(name = "netsdr", version, about = "NetSDR receiver control and I/Q capture")]
struct Cli {
    /// Settings file (JSON). Defaults to ./environments.json when present.
    #[arg(long, value_name = "FILE", global = true, env = "NETSDR_CONFIG")]
    config: Option<PathBuf>,

    /// Receiver host name or address.
    #[arg(long, global = true)]
    host: Option<String>,

    /// Receiver control (TCP) port.
    #[arg(long, value_name = "PORT", global = true)]
    tcp_port: Option<u16>,

    /// Local telemetry (UDP) port.
    #[arg(long, value_name = "PORT", global = true)]
    udp_port: Option<u16>,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            host: self.host.clone(),
            tcp_port: self.tcp_port,
            udp_port: self.udp_port,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = Settings::load(cli.config.as_deref())
        .map(|settings| settings.apply(&cli.overrides()))
        .and_then(|settings| cmd::run(cli.command, &settings, format));

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

//! Line-driven menu over a [`Session`].

use std::io::{self, BufRead, Write};

use netsdr_session::{Session, SessionConfig, SessionStatus, DEFAULT_OUTPUT_FILE};

use crate::cmd::ConsoleArgs;
use crate::exit::{io_error, CliResult, SUCCESS};
use crate::settings::Settings;

const MENU: &[(&str, &str)] = &[
    ("1", "Connect"),
    ("2", "Disconnect"),
    ("3", "Start I/Q transmitting"),
    ("4", "Stop I/Q transmitting"),
    ("5", "Change frequency"),
    ("6", "Status"),
    ("q", "Quit"),
];

pub fn run(args: ConsoleArgs, settings: &Settings) -> CliResult<i32> {
    let config = SessionConfig {
        output_path: args
            .output
            .unwrap_or_else(|| DEFAULT_OUTPUT_FILE.into()),
        ..SessionConfig::default()
    };
    let mut session = Session::with_config(config);
    let stdin = io::stdin();
    let stdout = io::stdout();
    Console::new(&mut session, settings)
        .run(stdin.lock(), stdout.lock())
        .map_err(|err| io_error("console failed", err))?;
    Ok(SUCCESS)
}

struct Console<'a> {
    session: &'a mut Session,
    settings: &'a Settings,
}

impl<'a> Console<'a> {
    fn new(session: &'a mut Session, settings: &'a Settings) -> Self {
        Self { session, settings }
    }

    /// Serve menu choices until `q` or end of input.
    fn run(&mut self, mut input: impl BufRead, mut out: impl Write) -> io::Result<()> {
        writeln!(out, "{}", "=".repeat(80))?;
        writeln!(out, "\nWelcome to the NetSDR console!")?;
        writeln!(out, "\nAvailable options: please enter a number")?;
        for (key, label) in MENU {
            writeln!(out, "{key} - {label}")?;
        }
        out.flush()?;

        let mut line = String::new();
        loop {
            line.clear();
            if input.read_line(&mut line)? == 0 {
                break;
            }
            match line.trim() {
                "1" => self.connect(&mut out)?,
                "2" => self.disconnect(&mut out)?,
                "3" => self.toggle(true, &mut out)?,
                "4" => self.toggle(false, &mut out)?,
                "5" => self.change_frequency(&mut input, &mut out)?,
                "6" => self.status(&mut out)?,
                "q" | "Q" | "quit" | "exit" => break,
                _ => writeln!(out, "Invalid command. Please try again.")?,
            }
            writeln!(out, "\nEnter the command")?;
            out.flush()?;
        }

        if self.session.is_connected() {
            self.disconnect(&mut out)?;
        }
        writeln!(out, "Bye.")?;
        out.flush()
    }

    fn connect(&mut self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "Connecting to receiver...")?;
        let Settings {
            host,
            tcp_port,
            udp_port,
            ..
        } = self.settings;
        match self.session.connect(host, *tcp_port, *udp_port) {
            Ok(()) => writeln!(out, "Connected!"),
            Err(err) => writeln!(out, "Failed to connect: {err}"),
        }
    }

    fn disconnect(&mut self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "Disconnecting from receiver...")?;
        match self.session.disconnect() {
            Ok(summary) => writeln!(
                out,
                "Disconnected! {} packets, {} bytes written.",
                summary.telemetry.packets, summary.telemetry.bytes_written
            ),
            Err(err) => writeln!(out, "Failed to disconnect: {err}"),
        }
    }

    fn toggle(&mut self, start: bool, out: &mut impl Write) -> io::Result<()> {
        if start {
            writeln!(out, "Starting I/Q transmitting...")?;
        } else {
            writeln!(out, "Stopping I/Q transmitting...")?;
        }
        match self
            .session
            .toggle_receiver_state(start, &self.settings.receiver)
        {
            Ok(response) => writeln!(out, "Response: {response}"),
            Err(err) => writeln!(out, "Failed: {err}"),
        }
    }

    fn change_frequency(&mut self, input: &mut impl BufRead, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "Enter frequency value in Hz")?;
        out.flush()?;
        let mut line = String::new();
        input.read_line(&mut line)?;
        let Ok(hz) = line.trim().parse::<i64>() else {
            return writeln!(out, "Enter valid digital value");
        };

        writeln!(out, "Changing frequency...")?;
        match self.session.set_frequency(hz, &self.settings.frequency) {
            Ok(response) => writeln!(out, "Response: {response}"),
            Err(err) => writeln!(out, "Failed: {err}"),
        }
    }

    fn status(&self, out: &mut impl Write) -> io::Result<()> {
        match self.session.status() {
            SessionStatus::Disconnected => writeln!(out, "Status: disconnected"),
            SessionStatus::Connected { receiver_on } => writeln!(
                out,
                "Status: connected to {}, receiver {}",
                self.session
                    .device_addr()
                    .map(|addr| addr.to_string())
                    .unwrap_or_default(),
                if receiver_on { "on" } else { "off" }
            ),
        }
    }
}

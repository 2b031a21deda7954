use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use netsdr_codec::{Command, Response};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
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

/// Something a command prints as its result.
pub trait Report: Serialize {
    /// Field/value pairs for the table and pretty renderings.
    fn rows(&self) -> Vec<(&'static str, String)>;
}

/// One command sent to the device and how it answered.
#[derive(Debug, Serialize)]
pub struct CommandOutcome {
    pub command: &'static str,
    pub bytes: String,
    pub response: String,
    pub kind: &'static str,
}

impl CommandOutcome {
    pub fn new(command: &'static str, sent: &Command, response: &Response) -> Self {
        Self {
            command,
            bytes: sent.to_hex(),
            response: response.to_string(),
            kind: response.kind(),
        }
    }
}

impl Report for CommandOutcome {
    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("command", self.command.to_string()),
            ("bytes", self.bytes.clone()),
            ("response", self.response.clone()),
        ]
    }
}

pub fn print_report(report: &impl Report, format: OutputFormat) {
    print!("{}", render(report, format));
}

pub fn render(report: &impl Report, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string());
            format!("{json}\n")
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (field, value) in report.rows() {
                table.add_row(vec![field.to_string(), value]);
            }
            format!("{table}\n")
        }
        OutputFormat::Pretty => {
            let line = report
                .rows()
                .into_iter()
                .map(|(field, value)| format!("{field}={value}"))
                .collect::<Vec<_>>()
                .join(" ");
            format!("{line}\n")
        }
    }
}

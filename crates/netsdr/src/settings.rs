//! The `environments.json` settings file.

use std::path::{Path, PathBuf};

use netsdr_codec::{FrequencyConfig, ReceiverConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::exit::{io_error, CliError, CliResult, DATA_INVALID};

/// File read from the working directory when `--config` is not given.
pub const DEFAULT_SETTINGS_FILE: &str = "environments.json";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_TCP_PORT: u16 = 50000;
pub const DEFAULT_UDP_PORT: u16 = 60000;

/// Where the receiver lives and how to drive it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    #[serde(default = "default_host", alias = "host")]
    pub host: String,
    #[serde(default = "default_tcp_port", alias = "tcpPort", alias = "tcp_port")]
    pub tcp_port: u16,
    #[serde(default = "default_udp_port", alias = "udpPort", alias = "udp_port")]
    pub udp_port: u16,
    #[serde(default, alias = "receiver", alias = "StartStopReceiver")]
    pub receiver: ReceiverConfig,
    #[serde(default, alias = "frequency", alias = "FrequencyConfig")]
    pub frequency: FrequencyConfig,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_tcp_port() -> u16 {
    DEFAULT_TCP_PORT
}

fn default_udp_port() -> u16 {
    DEFAULT_UDP_PORT
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: default_host(),
            tcp_port: DEFAULT_TCP_PORT,
            udp_port: DEFAULT_UDP_PORT,
            receiver: ReceiverConfig::default(),
            frequency: FrequencyConfig::default(),
        }
    }
}

/// Command-line values that win over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub host: Option<String>,
    pub tcp_port: Option<u16>,
    pub udp_port: Option<u16>,
}

impl Settings {
    /// Load settings.
    ///
    /// An explicit path must exist. Without one, `environments.json` in the
    /// working directory is used when present, defaults otherwise.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_SETTINGS_FILE), false),
        };

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if !required && err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(io_error(
                    &format!("failed reading {}", path.display()),
                    err,
                ))
            }
        };

        let settings = Self::from_json(&text).map_err(|err| {
            CliError::new(
                DATA_INVALID,
                format!("invalid settings in {}: {err}", path.display()),
            )
        })?;
        debug!(path = %path.display(), host = %settings.host, "loaded settings");
        Ok(settings)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn apply(mut self, overrides: &Overrides) -> Self {
        if let Some(host) = &overrides.host {
            self.host = host.clone();
        }
        if let Some(port) = overrides.tcp_port {
            self.tcp_port = port;
        }
        if let Some(port) = overrides.udp_port {
            self.udp_port = port;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::USAGE;

    fn unique_temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "netsdr-settings-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    #[test]
    fn parses_full_settings_file() {
        let settings = Settings::from_json(
            r#"{
                "Host": "10.0.0.5",
                "TcpPort": 50001,
                "UdpPort": 60001,
                "Receiver": { "IsComplex": true, "CaptureMode": "0x80" },
                "Frequency": { "ChannelId": "0x00" }
            }"#,
        )
        .unwrap();
        assert_eq!(settings.host, "10.0.0.5");
        assert_eq!(settings.tcp_port, 50001);
        assert_eq!(settings.udp_port, 60001);
        assert_eq!(settings.receiver, ReceiverConfig::complex(0x80));
        assert_eq!(settings.frequency, FrequencyConfig::channel(0x00));
    }

    #[test]
    fn accepts_legacy_and_lowercase_keys() {
        let settings = Settings::from_json(
            r#"{ "host": "sdr.local", "StartStopReceiver": { "captureMode": 1, "FifoSamples": 8 } }"#,
        )
        .unwrap();
        assert_eq!(settings.host, "sdr.local");
        assert_eq!(settings.receiver.capture_mode, 0x01);
        assert_eq!(settings.receiver.fifo_samples, Some(8));
        assert_eq!(settings.tcp_port, DEFAULT_TCP_PORT);
    }

    #[test]
    fn empty_object_is_all_defaults() {
        assert_eq!(Settings::from_json("{}").unwrap(), Settings::default());
    }

    #[test]
    fn overrides_win() {
        let settings = Settings::default().apply(&Overrides {
            host: Some("192.168.1.20".to_string()),
            tcp_port: None,
            udp_port: Some(61000),
        });
        assert_eq!(settings.host, "192.168.1.20");
        assert_eq!(settings.tcp_port, DEFAULT_TCP_PORT);
        assert_eq!(settings.udp_port, 61000);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = unique_temp_dir("missing");
        let err = Settings::load(Some(&dir.join("nope.json"))).unwrap_err();
        assert_ne!(err.code, USAGE);
        assert!(err.message.contains("nope.json"));
    }

    #[test]
    fn malformed_file_is_invalid_data() {
        let dir = unique_temp_dir("malformed");
        let path = dir.join("environments.json");
        std::fs::write(&path, r#"{ "TcpPort": "not a port" }"#).unwrap();
        let err = Settings::load(Some(&path)).unwrap_err();
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn loads_file_from_path() {
        let dir = unique_temp_dir("load");
        let path = dir.join("environments.json");
        std::fs::write(&path, r#"{ "UdpPort": 60123 }"#).unwrap();
        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.udp_port, 60123);
        assert_eq!(settings.host, DEFAULT_HOST);
    }
}

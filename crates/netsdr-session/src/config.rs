use std::path::PathBuf;
use std::time::Duration;

/// Default file the telemetry sink writes I/Q payloads to.
pub const DEFAULT_OUTPUT_FILE: &str = "iq_samples.bin";

/// What the telemetry sink does with datagrams while the receiver is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdlePolicy {
    /// Keep receiving and discard them.
    #[default]
    Drop,
    /// Stop receiving; datagrams wait in the socket buffer.
    Park,
}

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Bound on each TCP connect attempt.
    pub connect_timeout: Duration,
    /// How long a command waits for its response.
    pub response_timeout: Duration,
    /// Read timeout of the background loops; bounds how long `disconnect`
    /// waits for them to notice cancellation.
    pub poll_interval: Duration,
    /// File receiving the telemetry payloads; truncated on every connect.
    pub output_path: PathBuf,
    /// Telemetry handling while the receiver is off.
    pub idle_policy: IdlePolicy,
    /// Only accept telemetry datagrams sent from the device's address.
    pub filter_telemetry_source: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            output_path: PathBuf::from(DEFAULT_OUTPUT_FILE),
            idle_policy: IdlePolicy::Drop,
            filter_telemetry_source: true,
        }
    }
}

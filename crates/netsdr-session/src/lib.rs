//! Session layer for a NetSDR receiver.
//!
//! This is the "just works" layer. Connect to the device, start and stop
//! the receiver, tune it, and have I/Q telemetry written to disk while a
//! background listener reports device-initiated messages.

pub mod config;
pub mod error;
mod exchange;
pub mod listener;
pub mod session;
pub mod simulator;
pub mod telemetry;

pub use config::{IdlePolicy, SessionConfig, DEFAULT_OUTPUT_FILE};
pub use error::{Result, SessionError};
pub use listener::{ListenerStats, UnsolicitedMessage};
pub use session::{Session, SessionStatus, SessionSummary};
pub use simulator::{DeviceSimulator, SimulatorConfig};
pub use telemetry::{ReceiverWatch, TelemetryStats};

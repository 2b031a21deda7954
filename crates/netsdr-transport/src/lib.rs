//! Network transports for talking to a NetSDR receiver.
//!
//! Two channels reach the device:
//! - a TCP control stream carrying commands and acknowledgements
//! - a UDP telemetry socket receiving I/Q sample datagrams
//!
//! This is the lowest layer of netsdr. The codec and session crates build on
//! top of the [`ControlStream`] and [`TelemetrySocket`] types provided here.

pub mod control;
pub mod error;
pub mod telemetry;

pub use control::ControlStream;
pub use error::{is_timeout, Result, TransportError};
pub use telemetry::{TelemetrySocket, MAX_DATAGRAM_SIZE};

//! Control and I/Q telemetry capture for NetSDR receivers.
//!
//! A NetSDR receiver is driven over two channels: a TCP control channel for
//! commands and their acknowledgements, and a UDP telemetry channel carrying
//! I/Q sample datagrams.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP control stream and UDP telemetry socket
//! - [`codec`]: command encoding, response classification, packet layout
//! - [`session`]: connection state machine, background loops, device simulator

/// Re-export transport types.
pub mod transport {
    pub use netsdr_transport::*;
}

/// Re-export codec types.
pub mod codec {
    pub use netsdr_codec::*;
}

/// Re-export session types.
pub mod session {
    pub use netsdr_session::*;
}

//! Classification of what the device sends back on the control channel.
//!
//! The two header bytes are compared in the order they arrive:
//! `02 00` is a NAK and `60 03` is an ACK.

use std::fmt;

/// Header of a negative acknowledgement, as received.
pub const NAK_HEADER: &str = "0200";
/// Header of a positive acknowledgement, as received.
pub const ACK_HEADER: &str = "6003";

/// Wire bytes of a NAK header.
pub const NAK_BYTES: [u8; 2] = [0x02, 0x00];
/// Wire bytes of an ACK header.
pub const ACK_BYTES: [u8; 2] = [0x60, 0x03];

/// Reads shorter than this cannot be classified.
pub const MIN_RESPONSE_LEN: usize = 3;

/// Largest single read from the control channel.
pub const MAX_RESPONSE_LEN: usize = 1024;

/// What a single control-channel read turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The device accepted the command.
    Ack,
    /// The device does not support the command.
    Nak,
    /// Anything else, decoded as text.
    Raw(String),
    /// Too short to carry a header.
    Invalid,
}

impl Response {
    pub fn is_ack(&self) -> bool {
        matches!(self, Response::Ack)
    }

    pub fn is_nak(&self) -> bool {
        matches!(self, Response::Nak)
    }

    /// Short machine-friendly label.
    pub fn kind(&self) -> &'static str {
        match self {
            Response::Ack => "ack",
            Response::Nak => "nak",
            Response::Raw(_) => "raw",
            Response::Invalid => "invalid",
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ack => f.write_str("ACK"),
            Response::Nak => f.write_str("NAK"),
            Response::Raw(text) => f.write_str(text),
            Response::Invalid => f.write_str("Invalid response"),
        }
    }
}

/// Classify one control-channel read.
pub fn classify_response(buf: &[u8]) -> Response {
    if buf.len() < MIN_RESPONSE_LEN {
        return Response::Invalid;
    }
    let header = format!("{:02X}{:02X}", buf[0], buf[1]);
    match header.as_str() {
        NAK_HEADER => Response::Nak,
        ACK_HEADER => Response::Ack,
        _ => Response::Raw(String::from_utf8_lossy(buf).trim().to_string()),
    }
}

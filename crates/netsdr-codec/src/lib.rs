//! Binary wire format of the NetSDR control and telemetry channels.
//!
//! Every control message starts with a 4-byte header:
//! - a 2-byte little-endian message length (header included)
//! - a 2-byte little-endian control item code
//!
//! This crate is pure: it builds command bytes, validates command
//! parameters before anything reaches the wire, and classifies what the
//! device sends back. It performs no I/O.

pub mod command;
pub mod config;
pub mod error;
pub mod message;
pub mod packet;
pub mod response;

pub use command::{
    decode_command, encode_frequency, encode_receiver_state, hex, Command, DecodedCommand,
    FREQUENCY_ITEM, RECEIVER_STATE_ITEM,
};
pub use config::{FrequencyConfig, ReceiverConfig, CAPTURE_MODES, CHANNEL_IDS};
pub use error::{Result, ValidationError};
pub use message::{is_unsolicited, unsolicited_len, MessageHeader};
pub use packet::{IqPacket, PACKET_HEADER_SIZE};
pub use response::{classify_response, Response, MAX_RESPONSE_LEN};

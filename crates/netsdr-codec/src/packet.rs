//! Telemetry datagrams: a 4-byte header followed by I/Q sample bytes.
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────────────┐
//! │ header (2B)  │ sequence (2B)│ I/Q payload          │
//! │ LE, type+len │ LE           │ (rest of datagram)   │
//! └──────────────┴──────────────┴──────────────────────┘
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::message::{MessageHeader, MAX_MESSAGE_LEN, TYPE_DATA_ITEM_0};

/// Bytes stripped from every datagram before the payload is persisted.
pub const PACKET_HEADER_SIZE: usize = 4;

/// A telemetry datagram split into header and payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IqPacket<'a> {
    header: [u8; PACKET_HEADER_SIZE],
    payload: &'a [u8],
}

impl<'a> IqPacket<'a> {
    /// Split a datagram; `None` if it is shorter than the header.
    pub fn parse(datagram: &'a [u8]) -> Option<Self> {
        if datagram.len() < PACKET_HEADER_SIZE {
            return None;
        }
        let (head, payload) = datagram.split_at(PACKET_HEADER_SIZE);
        let mut header = [0u8; PACKET_HEADER_SIZE];
        header.copy_from_slice(head);
        Some(Self { header, payload })
    }

    /// The raw header bytes.
    pub fn header(&self) -> [u8; PACKET_HEADER_SIZE] {
        self.header
    }

    /// The packet sequence number.
    pub fn sequence(&self) -> u16 {
        u16::from_le_bytes([self.header[2], self.header[3]])
    }

    /// Sample bytes with the header stripped.
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }
}

/// Build a data item 0 datagram carrying `payload`.
pub fn encode_packet(sequence: u16, payload: &[u8]) -> Bytes {
    let len = PACKET_HEADER_SIZE + payload.len();
    let header = MessageHeader {
        kind: TYPE_DATA_ITEM_0,
        length: len.min(MAX_MESSAGE_LEN) as u16,
    };
    let mut dst = BytesMut::with_capacity(len);
    dst.put_u16_le(header.to_u16());
    dst.put_u16_le(sequence);
    dst.put_slice(payload);
    dst.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_four_byte_header() {
        let datagram = [0x0A, 0x80, 0x07, 0x00, 1, 2, 3, 4, 5, 6];
        let packet = IqPacket::parse(&datagram).unwrap();
        assert_eq!(packet.payload(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(packet.header(), [0x0A, 0x80, 0x07, 0x00]);
        assert_eq!(packet.sequence(), 7);
    }

    #[test]
    fn header_only_datagram_has_empty_payload() {
        let packet = IqPacket::parse(&[0x04, 0x80, 0x00, 0x00]).unwrap();
        assert!(packet.payload().is_empty());
    }

    #[test]
    fn short_datagrams_are_rejected() {
        assert!(IqPacket::parse(&[]).is_none());
        assert!(IqPacket::parse(&[0x04, 0x80, 0x00]).is_none());
    }

    #[test]
    fn encoded_packet_parses_back() {
        let datagram = encode_packet(42, &[9, 8, 7]);
        assert_eq!(datagram.as_ref(), &[0x07, 0x80, 42, 0, 9, 8, 7]);
        let packet = IqPacket::parse(&datagram).unwrap();
        assert_eq!(packet.sequence(), 42);
        assert_eq!(packet.payload(), &[9, 8, 7]);
    }
}

//! The 16-bit message header shared by control messages and data items.
//!
//! ```text
//! bit  15 14 13 | 12 ........................ 0
//!      type     | length (bytes, header included)
//! ```
//! The header is little-endian on the wire.

use bytes::{BufMut, Bytes, BytesMut};

/// Largest length the 13-bit field can carry.
pub const MAX_MESSAGE_LEN: usize = 0x1FFF;

/// Device reply to a set/request control item.
pub const TYPE_CONTROL_RESPONSE: u8 = 0b000;
/// Device-initiated control item.
pub const TYPE_UNSOLICITED: u8 = 0b001;
/// Device reply to a range request.
pub const TYPE_RANGE_RESPONSE: u8 = 0b010;
/// Data item acknowledgement.
pub const TYPE_DATA_ACK: u8 = 0b011;
/// First data item type (I/Q sample datagrams).
pub const TYPE_DATA_ITEM_0: u8 = 0b100;

/// Decoded message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// 3-bit message type.
    pub kind: u8,
    /// Declared message length in bytes.
    pub length: u16,
}

impl MessageHeader {
    /// Read the header from the first two bytes of `buf`.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        let raw = u16::from_le_bytes([*buf.first()?, *buf.get(1)?]);
        Some(Self {
            kind: (raw >> 13) as u8,
            length: raw & MAX_MESSAGE_LEN as u16,
        })
    }

    /// Pack into the on-wire 16-bit value.
    pub fn to_u16(self) -> u16 {
        (u16::from(self.kind & 0b111) << 13) | (self.length & MAX_MESSAGE_LEN as u16)
    }
}

/// Whether a control-channel chunk is shaped like a device push.
///
/// Only a chunk whose header says "unsolicited control item" *and* whose
/// declared length matches the chunk exactly counts; text replies that happen
/// to start with matching bits are not mistaken for pushes.
pub fn is_unsolicited(chunk: &[u8]) -> bool {
    match MessageHeader::parse(chunk) {
        Some(header) => header.kind == TYPE_UNSOLICITED && usize::from(header.length) == chunk.len(),
        None => false,
    }
}

/// Length of the complete device push at the start of `buf`, if one is there.
///
/// A push needs its header and control item code, and must fit in `buf`.
/// Lets a reader split pushes off a read that also carries a reply.
pub fn unsolicited_len(buf: &[u8]) -> Option<usize> {
    let header = MessageHeader::parse(buf)?;
    let len = usize::from(header.length);
    (header.kind == TYPE_UNSOLICITED && (4..=buf.len()).contains(&len)).then_some(len)
}

/// Build a device-initiated control item message.
pub fn encode_unsolicited(item: u16, params: &[u8]) -> Bytes {
    let len = 4 + params.len();
    let header = MessageHeader {
        kind: TYPE_UNSOLICITED,
        length: len.min(MAX_MESSAGE_LEN) as u16,
    };
    let mut dst = BytesMut::with_capacity(len);
    dst.put_u16_le(header.to_u16());
    dst.put_u16_le(item);
    dst.put_slice(params);
    dst.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_header() {
        let header = MessageHeader::parse(&[0x0A, 0x00, 0x20, 0x00]).unwrap();
        assert_eq!(header.kind, TYPE_CONTROL_RESPONSE);
        assert_eq!(header.length, 10);
    }

    #[test]
    fn parses_data_item_header() {
        // 0x8404: type 0b100, length 0x404 (1028 bytes).
        let header = MessageHeader::parse(&[0x04, 0x84]).unwrap();
        assert_eq!(header.kind, TYPE_DATA_ITEM_0);
        assert_eq!(header.length, 0x404);
        assert_eq!(header.to_u16(), 0x8404);
    }

    #[test]
    fn short_buffer_has_no_header() {
        assert!(MessageHeader::parse(&[0x04]).is_none());
        assert!(!is_unsolicited(&[0x04]));
    }

    #[test]
    fn unsolicited_requires_matching_length() {
        let push = encode_unsolicited(0x0018, &[0x80, 0x01]);
        assert_eq!(push.as_ref(), &[0x06, 0x20, 0x18, 0x00, 0x80, 0x01]);
        assert!(is_unsolicited(&push));

        // Same type bits, wrong declared length: text like "E 1" is not a push.
        assert!(!is_unsolicited(b"E 1"));
    }

    #[test]
    fn unsolicited_len_finds_leading_push() {
        let mut buf = encode_unsolicited(0x0018, &[0x80, 0x01]).to_vec();
        buf.extend_from_slice(&[0x60, 0x03, 0x00]);
        assert_eq!(unsolicited_len(&buf), Some(6));
        assert_eq!(unsolicited_len(&buf[6..]), None);

        // Truncated push, and a header too short to hold an item code.
        assert_eq!(unsolicited_len(&buf[..5]), None);
        assert_eq!(unsolicited_len(&[0x02, 0x20, 0x00]), None);
    }

    #[test]
    fn ack_and_nak_are_not_pushes() {
        assert!(!is_unsolicited(&[0x60, 0x03, 0x00]));
        assert!(!is_unsolicited(&[0x02, 0x00, 0x00]));
    }
}

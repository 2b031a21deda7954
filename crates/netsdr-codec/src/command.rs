use std::fmt::Write as _;

use bytes::{BufMut, Bytes, BytesMut};

use crate::config::{FrequencyConfig, ReceiverConfig};
use crate::error::{Result, ValidationError};

/// Length (2B) + control item code (2B).
pub const COMMAND_HEADER_SIZE: usize = 4;

/// Control item code of the receiver state (run/stop) command.
pub const RECEIVER_STATE_ITEM: u16 = 0x0018;
/// Control item code of the receiver frequency command.
pub const FREQUENCY_ITEM: u16 = 0x0020;

/// Total wire length of a receiver state command.
pub const RECEIVER_STATE_LEN: usize = 8;
/// Total wire length of a frequency command.
pub const FREQUENCY_LEN: usize = 10;

/// Data type byte: complex I/Q baseband data.
pub const DATA_TYPE_COMPLEX: u8 = 0x80;
/// Data type byte: real A/D samples.
pub const DATA_TYPE_REAL: u8 = 0x00;

/// Run/stop byte: start capturing.
pub const RUN: u8 = 0x02;
/// Run/stop byte: stop capturing.
pub const STOP: u8 = 0x01;

/// Number of frequency bytes on the wire (a 40-bit value).
pub const FREQUENCY_BYTES: usize = 5;

/// An encoded command, ready to be written to the control stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    item: u16,
    bytes: Bytes,
}

impl Command {
    /// Control item code this command addresses.
    pub fn item(&self) -> u16 {
        self.item
    }

    /// The wire bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Uppercase hex rendering of the wire bytes, for logs.
    pub fn to_hex(&self) -> String {
        hex(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

impl AsRef<[u8]> for Command {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Encode a receiver start/stop command.
///
/// Wire format (8 bytes):
/// ```text
/// ┌──────────┬──────────┬──────────┬─────────┬─────────┬──────────┐
/// │ 08 00    │ 18 00    │ dataType │ runStop │ capMode │ fifoLow  │
/// │ len (LE) │ item (LE)│ 80 / 00  │ 02 / 01 │         │          │
/// └──────────┴──────────┴──────────┴─────────┴─────────┴──────────┘
/// ```
pub fn encode_receiver_state(start: bool, cfg: &ReceiverConfig) -> Result<Command> {
    cfg.validate()?;

    let data_type = if cfg.is_complex {
        DATA_TYPE_COMPLEX
    } else {
        DATA_TYPE_REAL
    };
    let run_stop = if start { RUN } else { STOP };
    let fifo_low = cfg.fifo_samples.unwrap_or(0);

    let mut dst = BytesMut::with_capacity(RECEIVER_STATE_LEN);
    put_header(&mut dst, RECEIVER_STATE_LEN, RECEIVER_STATE_ITEM);
    dst.put_u8(data_type);
    dst.put_u8(run_stop);
    dst.put_u8(cfg.capture_mode);
    dst.put_u8(fifo_low);

    Ok(Command {
        item: RECEIVER_STATE_ITEM,
        bytes: dst.freeze(),
    })
}

/// Encode a set-frequency command.
///
/// Only the low five bytes of `hz` are sent; frequencies that need bit 40
/// or above are truncated.
pub fn encode_frequency(hz: i64, cfg: &FrequencyConfig) -> Result<Command> {
    if hz < 0 {
        return Err(ValidationError::NegativeFrequency(hz));
    }
    cfg.validate()?;

    let mut dst = BytesMut::with_capacity(FREQUENCY_LEN);
    put_header(&mut dst, FREQUENCY_LEN, FREQUENCY_ITEM);
    dst.put_u8(cfg.channel_id);
    dst.put_slice(&hz.to_le_bytes()[..FREQUENCY_BYTES]);

    Ok(Command {
        item: FREQUENCY_ITEM,
        bytes: dst.freeze(),
    })
}

fn put_header(dst: &mut BytesMut, len: usize, item: u16) {
    dst.put_u16_le(len as u16);
    dst.put_u16_le(item);
}

/// A command as seen by the device side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedCommand {
    ReceiverState {
        data_type: u8,
        run: bool,
        capture_mode: u8,
        fifo_samples: u8,
    },
    Frequency {
        channel_id: u8,
        hz: u64,
    },
    /// Well-framed message for a control item this crate does not encode.
    Other { item: u16 },
}

/// Decode one command from the start of `src`.
///
/// Returns the command and the number of bytes it occupied, or `None` if
/// `src` does not hold a complete, well-formed message yet.
pub fn decode_command(src: &[u8]) -> Option<(DecodedCommand, usize)> {
    if src.len() < COMMAND_HEADER_SIZE {
        return None;
    }
    let len = usize::from(u16::from_le_bytes([src[0], src[1]]) & 0x1FFF);
    let item = u16::from_le_bytes([src[2], src[3]]);
    if len < COMMAND_HEADER_SIZE || src.len() < len {
        return None;
    }
    let body = &src[COMMAND_HEADER_SIZE..len];

    let decoded = match (item, body) {
        (RECEIVER_STATE_ITEM, [data_type, run_stop, capture_mode, fifo]) => {
            DecodedCommand::ReceiverState {
                data_type: *data_type,
                run: *run_stop == RUN,
                capture_mode: *capture_mode,
                fifo_samples: *fifo,
            }
        }
        (FREQUENCY_ITEM, [channel_id, freq @ ..]) if freq.len() == FREQUENCY_BYTES => {
            let mut wide = [0u8; 8];
            wide[..FREQUENCY_BYTES].copy_from_slice(freq);
            DecodedCommand::Frequency {
                channel_id: *channel_id,
                hz: u64::from_le_bytes(wide),
            }
        }
        _ => DecodedCommand::Other { item },
    };
    Some((decoded, len))
}

/// Uppercase hex with no separators (`0800180080028000`).
pub fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02X}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CAPTURE_MODES, CAPTURE_MODE_FIFO, CHANNEL_1};

    #[test]
    fn start_complex_contiguous_capture() {
        let cmd = encode_receiver_state(true, &ReceiverConfig::complex(0x80)).unwrap();
        assert_eq!(
            cmd.as_bytes(),
            &[0x08, 0x00, 0x18, 0x00, 0x80, 0x02, 0x80, 0x00]
        );
        assert_eq!(cmd.to_hex(), "0800180080028000");
        assert_eq!(cmd.item(), RECEIVER_STATE_ITEM);
    }

    #[test]
    fn stop_complex_contiguous_capture() {
        let cmd = encode_receiver_state(false, &ReceiverConfig::complex(0x80)).unwrap();
        assert_eq!(cmd.to_hex(), "0800180080018000");
    }

    #[test]
    fn real_samples_fifo_mode_carries_sample_count() {
        let cfg = ReceiverConfig {
            is_complex: false,
            capture_mode: CAPTURE_MODE_FIFO,
            fifo_samples: Some(0x20),
        };
        let cmd = encode_receiver_state(true, &cfg).unwrap();
        assert_eq!(
            cmd.as_bytes(),
            &[0x08, 0x00, 0x18, 0x00, 0x00, 0x02, 0x01, 0x20]
        );
    }

    #[test]
    fn receiver_state_rejects_unknown_capture_mode() {
        for mode in [0x02u8, 0x7F, 0x81, 0x99, 0xFF] {
            assert!(!CAPTURE_MODES.contains(&mode));
            let err = encode_receiver_state(true, &ReceiverConfig::complex(mode)).unwrap_err();
            assert_eq!(err, ValidationError::InvalidCaptureMode(mode));
        }
    }

    #[test]
    fn receiver_state_rejects_fifo_without_samples() {
        let cfg = ReceiverConfig::complex(CAPTURE_MODE_FIFO).with_fifo_samples(0);
        assert_eq!(
            encode_receiver_state(true, &cfg).unwrap_err(),
            ValidationError::FifoSamplesRequired
        );
        let cfg = ReceiverConfig::complex(CAPTURE_MODE_FIFO);
        assert_eq!(
            encode_receiver_state(false, &cfg).unwrap_err(),
            ValidationError::FifoSamplesRequired
        );
    }

    #[test]
    fn frequency_low_five_bytes_little_endian() {
        let cmd = encode_frequency(14_010_000, &FrequencyConfig::channel(CHANNEL_1)).unwrap();
        assert_eq!(
            cmd.as_bytes(),
            &[0x0A, 0x00, 0x20, 0x00, 0x00, 0x90, 0xC6, 0xD5, 0x00, 0x00]
        );
        assert_eq!(cmd.to_hex(), "0A0020000090C6D50000");
    }

    #[test]
    fn frequency_above_40_bits_is_truncated() {
        let hz = (1i64 << 40) + 0x1234;
        let cmd = encode_frequency(hz, &FrequencyConfig::default()).unwrap();
        assert_eq!(&cmd.as_bytes()[5..], &[0x34, 0x12, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn frequency_rejects_negative_values() {
        for hz in [-1i64, -14_010_000, i64::MIN] {
            assert_eq!(
                encode_frequency(hz, &FrequencyConfig::default()).unwrap_err(),
                ValidationError::NegativeFrequency(hz)
            );
        }
    }

    #[test]
    fn frequency_rejects_unknown_channel() {
        let err = encode_frequency(1_000_000, &FrequencyConfig::channel(0x01)).unwrap_err();
        assert_eq!(err, ValidationError::InvalidChannel(0x01));
    }

    #[test]
    fn negative_frequency_is_reported_before_channel() {
        let err = encode_frequency(-5, &FrequencyConfig::channel(0x07)).unwrap_err();
        assert_eq!(err, ValidationError::NegativeFrequency(-5));
    }

    #[test]
    fn device_side_decodes_commands() {
        let cmd = encode_frequency(7_100_000, &FrequencyConfig::channel(0x02)).unwrap();
        let (decoded, used) = decode_command(cmd.as_bytes()).unwrap();
        assert_eq!(used, FREQUENCY_LEN);
        assert_eq!(
            decoded,
            DecodedCommand::Frequency {
                channel_id: 0x02,
                hz: 7_100_000
            }
        );

        let cmd = encode_receiver_state(false, &ReceiverConfig::complex(0x83)).unwrap();
        let (decoded, used) = decode_command(cmd.as_bytes()).unwrap();
        assert_eq!(used, RECEIVER_STATE_LEN);
        assert!(matches!(
            decoded,
            DecodedCommand::ReceiverState {
                run: false,
                capture_mode: 0x83,
                ..
            }
        ));
    }

    #[test]
    fn decode_waits_for_complete_message() {
        assert!(decode_command(&[0x0A, 0x00, 0x20, 0x00, 0x00]).is_none());
        assert!(decode_command(&[0x0A]).is_none());
    }

    #[test]
    fn decode_unknown_item() {
        let (decoded, used) = decode_command(&[0x05, 0x00, 0x99, 0x00, 0x01]).unwrap();
        assert_eq!(decoded, DecodedCommand::Other { item: 0x0099 });
        assert_eq!(used, 5);
    }
}

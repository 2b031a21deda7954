//! Per-call command parameters.
//!
//! Byte-valued fields deserialize from either a number or a hex string
//! (`"0x80"`, `"80"`), which is how settings files usually spell them.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

/// Capture modes accepted by the receiver state command.
pub const CAPTURE_MODES: [u8; 5] = [0x00, 0x80, 0x01, 0x83, 0x03];

/// FIFO capture mode; needs a sample count.
pub const CAPTURE_MODE_FIFO: u8 = 0x01;

/// Tuner channel 1.
pub const CHANNEL_1: u8 = 0x00;
/// Tuner channel 2.
pub const CHANNEL_2: u8 = 0x02;
/// All tuner channels.
pub const ALL_CHANNELS: u8 = 0xFF;

/// Channel IDs accepted by the frequency command.
pub const CHANNEL_IDS: [u8; 3] = [CHANNEL_1, CHANNEL_2, ALL_CHANNELS];

/// Parameters of a receiver start/stop command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReceiverConfig {
    /// Complex I/Q baseband data (`true`) or real A/D samples.
    #[serde(default = "default_is_complex", alias = "isComplex", alias = "is_complex")]
    pub is_complex: bool,
    /// One of [`CAPTURE_MODES`].
    #[serde(
        default,
        with = "hex_byte",
        alias = "captureMode",
        alias = "capture_mode"
    )]
    pub capture_mode: u8,
    /// Samples per FIFO block; required in FIFO capture mode.
    #[serde(default, alias = "fifoSamples", alias = "fifo_samples")]
    pub fifo_samples: Option<u8>,
}

fn default_is_complex() -> bool {
    true
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            is_complex: true,
            capture_mode: 0x00,
            fifo_samples: None,
        }
    }
}

impl ReceiverConfig {
    /// Complex I/Q capture in the given mode.
    pub fn complex(capture_mode: u8) -> Self {
        Self {
            is_complex: true,
            capture_mode,
            fifo_samples: None,
        }
    }

    /// Set the FIFO sample count.
    pub fn with_fifo_samples(mut self, samples: u8) -> Self {
        self.fifo_samples = Some(samples);
        self
    }

    /// Check the parameters against what the receiver accepts.
    pub fn validate(&self) -> Result<()> {
        if !CAPTURE_MODES.contains(&self.capture_mode) {
            return Err(ValidationError::InvalidCaptureMode(self.capture_mode));
        }
        if self.capture_mode == CAPTURE_MODE_FIFO && matches!(self.fifo_samples, None | Some(0)) {
            return Err(ValidationError::FifoSamplesRequired);
        }
        Ok(())
    }
}

/// Parameters of a set-frequency command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FrequencyConfig {
    /// One of [`CHANNEL_IDS`].
    #[serde(
        default = "default_channel_id",
        with = "hex_byte",
        alias = "channelId",
        alias = "channel_id"
    )]
    pub channel_id: u8,
}

fn default_channel_id() -> u8 {
    ALL_CHANNELS
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            channel_id: ALL_CHANNELS,
        }
    }
}

impl FrequencyConfig {
    pub fn channel(channel_id: u8) -> Self {
        Self { channel_id }
    }

    /// Check the channel against what the receiver accepts.
    pub fn validate(&self) -> Result<()> {
        if !CHANNEL_IDS.contains(&self.channel_id) {
            return Err(ValidationError::InvalidChannel(self.channel_id));
        }
        Ok(())
    }
}

/// Parse a byte written as `0xNN`, `NN` hex, or a decimal number with `#` prefix.
///
/// Bare digits are read as hex because every byte setting of the receiver is
/// documented in hex.
pub fn parse_hex_byte(input: &str) -> std::result::Result<u8, std::num::ParseIntError> {
    let input = input.trim();
    if let Some(decimal) = input.strip_prefix('#') {
        return decimal.parse();
    }
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    u8::from_str_radix(digits, 16)
}

mod hex_byte {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u8),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &u8, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{value:02X}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => super::parse_hex_byte(&text)
                .map_err(|err| D::Error::custom(format!("invalid hex byte '{text}': {err}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_capture_mode_validates() {
        for mode in CAPTURE_MODES {
            let cfg = ReceiverConfig::complex(mode).with_fifo_samples(16);
            assert_eq!(cfg.validate(), Ok(()), "mode 0x{mode:02X}");
        }
    }

    #[test]
    fn unlisted_capture_modes_are_rejected() {
        for mode in (0u8..=255).filter(|m| !CAPTURE_MODES.contains(m)) {
            let cfg = ReceiverConfig::complex(mode);
            assert_eq!(
                cfg.validate(),
                Err(ValidationError::InvalidCaptureMode(mode))
            );
        }
    }

    #[test]
    fn fifo_mode_needs_samples() {
        let missing = ReceiverConfig::complex(CAPTURE_MODE_FIFO);
        assert_eq!(missing.validate(), Err(ValidationError::FifoSamplesRequired));

        let zero = ReceiverConfig::complex(CAPTURE_MODE_FIFO).with_fifo_samples(0);
        assert_eq!(zero.validate(), Err(ValidationError::FifoSamplesRequired));

        let some = ReceiverConfig::complex(CAPTURE_MODE_FIFO).with_fifo_samples(1);
        assert_eq!(some.validate(), Ok(()));
    }

    #[test]
    fn channel_validation() {
        for id in CHANNEL_IDS {
            assert_eq!(FrequencyConfig::channel(id).validate(), Ok(()));
        }
        assert_eq!(
            FrequencyConfig::channel(0x01).validate(),
            Err(ValidationError::InvalidChannel(0x01))
        );
    }

    #[test]
    fn deserializes_settings_style_json() {
        let cfg: ReceiverConfig =
            serde_json::from_str(r#"{"IsComplex": false, "CaptureMode": "0x01", "FifoSamples": 32}"#)
                .unwrap();
        assert_eq!(
            cfg,
            ReceiverConfig {
                is_complex: false,
                capture_mode: 0x01,
                fifo_samples: Some(32),
            }
        );

        let freq: FrequencyConfig = serde_json::from_str(r#"{"ChannelId": "0x02"}"#).unwrap();
        assert_eq!(freq.channel_id, CHANNEL_2);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: ReceiverConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, ReceiverConfig::default());

        let freq: FrequencyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(freq.channel_id, ALL_CHANNELS);
    }

    #[test]
    fn byte_fields_serialize_as_hex_strings() {
        let json = serde_json::to_string(&FrequencyConfig::channel(0xFF)).unwrap();
        assert_eq!(json, r#"{"ChannelId":"0xFF"}"#);
    }

    #[test]
    fn parse_hex_byte_forms() {
        assert_eq!(parse_hex_byte("0x83"), Ok(0x83));
        assert_eq!(parse_hex_byte("ff"), Ok(0xFF));
        assert_eq!(parse_hex_byte("#16"), Ok(16));
        assert!(parse_hex_byte("0x100").is_err());
        assert!(parse_hex_byte("zz").is_err());
    }
}

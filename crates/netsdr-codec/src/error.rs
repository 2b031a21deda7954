/// Command parameters rejected before any bytes are sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Capture mode outside the set the receiver understands.
    #[error("invalid capture mode 0x{0:02X}")]
    InvalidCaptureMode(u8),

    /// FIFO capture mode was requested without a sample count.
    #[error("FIFO mode requires a non-zero number of samples")]
    FifoSamplesRequired,

    /// Frequencies are unsigned on the wire.
    #[error("frequency must be a non-negative value (got {0})")]
    NegativeFrequency(i64),

    /// Channel outside 0x00 (channel 1), 0x02 (channel 2), 0xFF (all channels).
    #[error("invalid channel ID 0x{0:02X}; must be 0x00 (channel 1), 0x02 (channel 2) or 0xFF (all channels)")]
    InvalidChannel(u8),
}

pub type Result<T> = std::result::Result<T, ValidationError>;

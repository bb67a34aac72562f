//! Error types for the Manchester link core

use thiserror::Error;

/// Result type for link operations
pub type Result<T> = std::result::Result<T, LinkError>;

/// Errors raised while configuring or driving the link
///
/// A busy transmit buffer is not an error: `TransmitBuffer::try_submit`
/// reports it by returning `false` and the caller retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// Bit rate is below what the fractional divider can reach without a prescaler
    #[error("Bit rate too low: {requested} bit/s (minimum {minimum} bit/s without prescaler)")]
    BitRateTooLow { requested: u32, minimum: u32 },

    /// Bit rate can never be realized
    #[error("Invalid bit rate: {0}")]
    InvalidBitRate(String),

    /// Payload does not fit behind the framing byte
    #[error("Payload too large: {len} bytes (maximum {max})")]
    PayloadTooLarge { len: usize, max: usize },

    /// Truth table value is neither the XOR nor the XNOR table
    #[error("Unsupported truth table: {0:#04x}")]
    UnsupportedTruthTable(u8),

    /// Peripheral is in a state that does not allow the operation
    #[error("Peripheral not ready: {0}")]
    NotReady(String),

    /// Line levels requested from a logic cell that was never enabled
    #[error("Line encoder disabled: {0}")]
    EncoderDisabled(String),
}

impl LinkError {
    /// Create a new BitRateTooLow error
    pub fn bit_rate_too_low(requested: u32, minimum: u32) -> Self {
        LinkError::BitRateTooLow { requested, minimum }
    }

    /// Create a new InvalidBitRate error
    pub fn invalid_bit_rate(msg: impl Into<String>) -> Self {
        LinkError::InvalidBitRate(msg.into())
    }

    /// Create a new PayloadTooLarge error
    pub fn payload_too_large(len: usize, max: usize) -> Self {
        LinkError::PayloadTooLarge { len, max }
    }

    /// Create a new NotReady error
    pub fn not_ready(msg: impl Into<String>) -> Self {
        LinkError::NotReady(msg.into())
    }

    /// Create a new EncoderDisabled error
    pub fn encoder_disabled(msg: impl Into<String>) -> Self {
        LinkError::EncoderDisabled(msg.into())
    }
}

//! Core value types: bit rate, link configuration and validated packets

use crate::defaults;
use crate::encoding::EncodingConvention;
use crate::error::{LinkError, Result};

/// Serial bit rate in bit/s
///
/// Rates below [`defaults::MIN_BIT_RATE`] cannot be produced by the
/// fractional divider from the reference clock and are only accepted when
/// the caller has enabled a clock prescaler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u32", into = "u32"))]
pub struct BitRate(u32);

impl BitRate {
    /// Minimum bit rate without prescaler
    pub const MIN: u32 = defaults::MIN_BIT_RATE;

    /// Create a new bit rate, validating it's reachable without prescaler
    pub fn new(bits_per_second: u32) -> Result<Self> {
        if bits_per_second < Self::MIN {
            return Err(LinkError::bit_rate_too_low(bits_per_second, Self::MIN));
        }
        Ok(BitRate(bits_per_second))
    }

    /// Create a bit rate for a transmitter whose clock is prescaled
    ///
    /// Only zero is rejected; deriving a matching divider is up to the caller.
    pub fn with_prescaler(bits_per_second: u32) -> Result<Self> {
        if bits_per_second == 0 {
            return Err(LinkError::invalid_bit_rate("bit rate must be non-zero"));
        }
        Ok(BitRate(bits_per_second))
    }

    /// Get the raw bit rate value
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Duration of one byte on the line, in microseconds (rounded up)
    pub fn byte_period_us(&self) -> u32 {
        8_000_000u32.div_ceil(self.0)
    }
}

impl Default for BitRate {
    fn default() -> Self {
        BitRate(defaults::BIT_RATE)
    }
}

impl TryFrom<u32> for BitRate {
    type Error = LinkError;

    fn try_from(bits_per_second: u32) -> Result<Self> {
        BitRate::new(bits_per_second)
    }
}

impl From<BitRate> for u32 {
    fn from(bit_rate: BitRate) -> Self {
        bit_rate.0
    }
}

impl std::fmt::Display for BitRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} bit/s", self.0)
    }
}

/// Startup configuration of the link, read-only once the link is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkConfig {
    /// Bit rate programmed into the transmitter
    pub bit_rate: BitRate,
    /// Manchester convention programmed into the line encoder
    pub convention: EncodingConvention,
}

impl LinkConfig {
    /// Create a new link configuration
    pub fn new(bit_rate: BitRate, convention: EncodingConvention) -> Self {
        LinkConfig {
            bit_rate,
            convention,
        }
    }
}

impl std::fmt::Display for LinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.bit_rate, self.convention)
    }
}

/// A payload that fits behind the framing byte of a transmit buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    payload: &'a [u8],
}

impl<'a> Packet<'a> {
    /// Largest payload in bytes
    pub const MAX_LEN: usize = defaults::MAX_PAYLOAD;

    /// Create a new packet, validating its length
    pub fn new(payload: &'a [u8]) -> Result<Self> {
        if payload.len() > Self::MAX_LEN {
            return Err(LinkError::payload_too_large(payload.len(), Self::MAX_LEN));
        }
        Ok(Packet { payload })
    }

    /// Payload bytes, framing byte excluded
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Check if the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Number of bytes on the wire, framing byte included
    pub fn framed_len(&self) -> usize {
        self.payload.len() + 1
    }
}

impl<'a> TryFrom<&'a [u8]> for Packet<'a> {
    type Error = LinkError;

    fn try_from(payload: &'a [u8]) -> Result<Self> {
        Packet::new(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_rate_creation() {
        assert!(BitRate::new(16_000).is_ok());
        assert!(BitRate::new(50_000).is_ok());
        assert_eq!(
            BitRate::new(9_600),
            Err(LinkError::BitRateTooLow {
                requested: 9_600,
                minimum: 16_000
            })
        );
    }

    #[test]
    fn test_bit_rate_with_prescaler() -> Result<()> {
        assert_eq!(BitRate::with_prescaler(9_600)?.value(), 9_600);
        assert!(BitRate::with_prescaler(0).is_err());
        Ok(())
    }

    #[test]
    fn test_bit_rate_default() {
        assert_eq!(BitRate::default().value(), 50_000);
        assert_eq!(BitRate::default().to_string(), "50000 bit/s");
    }

    #[test]
    fn test_byte_period() -> Result<()> {
        assert_eq!(BitRate::new(50_000)?.byte_period_us(), 160);
        assert_eq!(BitRate::new(30_000)?.byte_period_us(), 267);
        Ok(())
    }

    #[test]
    fn test_link_config_default() {
        let config = LinkConfig::default();
        assert_eq!(config.bit_rate.value(), 50_000);
        assert_eq!(config.convention, EncodingConvention::Thomas);
    }

    #[test]
    fn test_packet_limits() {
        let max = [0u8; 254];
        let packet = Packet::new(&max).unwrap();
        assert_eq!(packet.framed_len(), 255);

        let too_big = [0u8; 255];
        assert_eq!(
            Packet::new(&too_big),
            Err(LinkError::PayloadTooLarge { len: 255, max: 254 })
        );
    }

    #[test]
    fn test_empty_packet() -> Result<()> {
        let empty: &[u8] = &[];
        let packet = Packet::try_from(empty)?;
        assert!(packet.is_empty());
        assert_eq!(packet.framed_len(), 1);
        Ok(())
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_link_config_json() {
        let config = LinkConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let decoded: LinkConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, decoded);

        let too_slow = r#"{"bit_rate":9600,"convention":"Thomas"}"#;
        assert!(serde_json::from_str::<LinkConfig>(too_slow).is_err());
    }
}

//! Manchester line encoding conventions and the logic cell that applies them

use crate::error::{LinkError, Result};

/// Manchester encoding convention, fixed once before transmission starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EncodingConvention {
    /// G.E. Thomas Manchester (XNOR): 0 = low-to-high, 1 = high-to-low
    #[default]
    Thomas,
    /// IEEE 802.3 Manchester (XOR): 0 = high-to-low, 1 = low-to-high
    Ieee,
}

impl EncodingConvention {
    /// Truth table of a two-input XNOR gate
    pub const XNOR_TABLE: u8 = 0b1001;
    /// Truth table of a two-input XOR gate
    pub const XOR_TABLE: u8 = 0b0110;

    /// Raw look-up table value for this convention
    ///
    /// Bit `i` holds the output for input index `i = data | (clock << 1)`.
    pub fn truth_table(&self) -> u8 {
        match self {
            EncodingConvention::Thomas => Self::XNOR_TABLE,
            EncodingConvention::Ieee => Self::XOR_TABLE,
        }
    }

    /// Recover the convention from a programmed truth table
    pub fn from_truth_table(table: u8) -> Result<Self> {
        match table {
            Self::XNOR_TABLE => Ok(EncodingConvention::Thomas),
            Self::XOR_TABLE => Ok(EncodingConvention::Ieee),
            other => Err(LinkError::UnsupportedTruthTable(other)),
        }
    }

    /// Line level produced for one data level and one clock level
    pub fn encode_level(&self, data: bool, clock: bool) -> bool {
        lut_output(self.truth_table(), data, clock)
    }
}

impl std::fmt::Display for EncodingConvention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodingConvention::Thomas => write!(f, "G.E. Thomas (XNOR)"),
            EncodingConvention::Ieee => write!(f, "IEEE 802.3 (XOR)"),
        }
    }
}

/// Evaluate a two-input look-up table
pub(crate) fn lut_output(table: u8, data: bool, clock: bool) -> bool {
    let index = (data as u8) | ((clock as u8) << 1);
    (table >> index) & 1 != 0
}

/// Software model of the line produced by the transmitter and logic cell
///
/// The transmitter shifts each byte out MSB first. Its clock is high during
/// the first half of every bit period and low during the second, so each data
/// bit becomes two line levels.
pub struct ManchesterEncoder;

impl ManchesterEncoder {
    /// Encode a single bit into its (first half, second half) line levels
    pub fn encode_bit(bit: bool, convention: EncodingConvention) -> (bool, bool) {
        (
            convention.encode_level(bit, true),
            convention.encode_level(bit, false),
        )
    }

    /// Encode a byte into 16 half-bit levels
    ///
    /// Bit 15 of the result is the first level on the line.
    pub fn encode_byte(byte: u8, convention: EncodingConvention) -> u16 {
        Self::encode_byte_with_table(byte, convention.truth_table())
    }

    /// Encode multiple bytes, one `u16` of half-bit levels per byte
    pub fn encode_bytes(data: &[u8], convention: EncodingConvention) -> Vec<u16> {
        data.iter()
            .map(|&byte| Self::encode_byte(byte, convention))
            .collect()
    }

    /// Expand bytes into the sequence of line levels, in transmission order
    pub fn line_levels(data: &[u8], convention: EncodingConvention) -> Vec<bool> {
        Self::line_levels_with_table(data, convention.truth_table())
    }

    pub(crate) fn encode_byte_with_table(byte: u8, table: u8) -> u16 {
        let mut levels = 0u16;
        for bit in (0..8).rev() {
            let data = (byte >> bit) & 1 != 0;
            levels <<= 2;
            levels |= (lut_output(table, data, true) as u16) << 1;
            levels |= lut_output(table, data, false) as u16;
        }
        levels
    }

    pub(crate) fn line_levels_with_table(data: &[u8], table: u8) -> Vec<bool> {
        let mut result = Vec::with_capacity(data.len() * crate::defaults::HALF_BITS_PER_BYTE);
        for &byte in data {
            let levels = Self::encode_byte_with_table(byte, table);
            for shift in (0..16).rev() {
                result.push((levels >> shift) & 1 != 0);
            }
        }
        result
    }
}

/// Programmable logic cell combining serial data with the transmitter clock
pub trait LineEncoder {
    /// Load the truth table for `convention` and enable the cell
    fn configure(&self, convention: EncodingConvention);

    /// Convention currently applied on the line, `None` while disabled
    fn convention(&self) -> Option<EncodingConvention>;
}

/// Program the line encoder. Must run before the transmitter is enabled.
pub fn configure_encoder<E: LineEncoder + ?Sized>(encoder: &E, convention: EncodingConvention) {
    log::info!(
        "configuring line encoder: {} (truth table {:#06b})",
        convention,
        convention.truth_table()
    );
    encoder.configure(convention);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_truth_tables() {
        assert_eq!(EncodingConvention::Thomas.truth_table(), 9);
        assert_eq!(EncodingConvention::Ieee.truth_table(), 6);
        assert_eq!(EncodingConvention::default(), EncodingConvention::Thomas);
    }

    #[test]
    fn test_from_truth_table() -> Result<()> {
        assert_eq!(EncodingConvention::from_truth_table(9)?, EncodingConvention::Thomas);
        assert_eq!(EncodingConvention::from_truth_table(6)?, EncodingConvention::Ieee);
        assert_eq!(
            EncodingConvention::from_truth_table(0x0F),
            Err(LinkError::UnsupportedTruthTable(0x0F))
        );
        Ok(())
    }

    #[test]
    fn test_xor_and_xnor_levels() {
        for data in [false, true] {
            for clock in [false, true] {
                assert_eq!(EncodingConvention::Ieee.encode_level(data, clock), data ^ clock);
                assert_eq!(EncodingConvention::Thomas.encode_level(data, clock), !(data ^ clock));
            }
        }
    }

    #[test]
    fn test_encode_bit_transitions() {
        // Thomas: 0 = low-to-high, 1 = high-to-low
        assert_eq!(ManchesterEncoder::encode_bit(false, EncodingConvention::Thomas), (false, true));
        assert_eq!(ManchesterEncoder::encode_bit(true, EncodingConvention::Thomas), (true, false));
        // IEEE: 0 = high-to-low, 1 = low-to-high
        assert_eq!(ManchesterEncoder::encode_bit(false, EncodingConvention::Ieee), (true, false));
        assert_eq!(ManchesterEncoder::encode_bit(true, EncodingConvention::Ieee), (false, true));
    }

    #[test]
    fn test_encode_start_byte() {
        assert_eq!(ManchesterEncoder::encode_byte(0x55, EncodingConvention::Thomas), 0x6666);
        assert_eq!(ManchesterEncoder::encode_byte(0x55, EncodingConvention::Ieee), 0x9999);
        assert_eq!(ManchesterEncoder::encode_byte(0x00, EncodingConvention::Thomas), 0x5555);
        assert_eq!(ManchesterEncoder::encode_byte(0xFF, EncodingConvention::Thomas), 0xAAAA);
    }

    #[test]
    fn test_every_bit_has_mid_transition() {
        let levels = ManchesterEncoder::line_levels(b"Hello", EncodingConvention::Ieee);
        assert_eq!(levels.len(), 5 * 16);
        for pair in levels.chunks(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn test_conventions_are_complements() {
        let thomas = ManchesterEncoder::encode_bytes(b"Manchester", EncodingConvention::Thomas);
        let ieee = ManchesterEncoder::encode_bytes(b"Manchester", EncodingConvention::Ieee);
        for (a, b) in thomas.iter().zip(ieee.iter()) {
            assert_eq!(*a, !*b);
        }
    }

    struct RecordingEncoder(Cell<Option<EncodingConvention>>);

    impl LineEncoder for RecordingEncoder {
        fn configure(&self, convention: EncodingConvention) {
            self.0.set(Some(convention));
        }

        fn convention(&self) -> Option<EncodingConvention> {
            self.0.get()
        }
    }

    #[test]
    fn test_configure_encoder() {
        let encoder = RecordingEncoder(Cell::new(None));
        assert_eq!(encoder.convention(), None);
        configure_encoder(&encoder, EncodingConvention::Ieee);
        assert_eq!(encoder.convention(), Some(EncodingConvention::Ieee));
    }
}

//! # Manchester Link
//!
//! Transmit-side core of an interrupt-driven Manchester encoder.
//!
//! A serial transmitter running in master-synchronous mode shifts bytes out
//! while a two-input logic cell combines its data line with its clock,
//! producing Manchester-encoded line levels. This crate provides:
//!
//! - Encoding convention selection (G.E. Thomas / XNOR, IEEE 802.3 / XOR)
//! - A framed transmit buffer shared between the foreground loop and the
//!   byte-ready interrupt, guarded by a single atomic busy flag
//! - The byte-ready state machine that drains the buffer
//! - The packet scheduler that enforces a guard interval between packets
//! - A register-level simulation of the transmitter and logic cell
//!
//! ## Features
//!
//! - `serde`: Enable serialization/deserialization support
//!
//! ## Example
//!
//! ```
//! use manchester_link::sim::{SimCcl, SimUsart};
//! use manchester_link::{LinkBuilder, Packet};
//!
//! let link = LinkBuilder::new()
//!     .with_bit_rate(50_000)
//!     .build(SimUsart::new(), SimCcl::new())?;
//!
//! let packet = Packet::new(b"Hello Manchester!")?;
//! assert!(link.buffer().try_submit(&packet));
//! assert_eq!(link.buffer().len(), 18);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod buffer;
pub mod core;
pub mod encoding;
pub mod error;
pub mod protocol;
pub mod scheduler;
pub mod sim;
pub mod transmitter;

pub use buffer::TransmitBuffer;
pub use crate::core::{BitRate, LinkConfig, Packet};
pub use encoding::{EncodingConvention, LineEncoder, ManchesterEncoder};
pub use error::{LinkError, Result};
pub use protocol::{LinkStats, TransmitStateMachine, TxState};
pub use scheduler::{
    ByteReadyHandler, Foreground, GuardInterval, Link, LinkBuilder, PacketScheduler, SubmitOutcome,
};
pub use transmitter::SerialTransmitter;

/// Link-layer constants for the reference target
pub mod defaults {
    /// Default bit rate in bit/s
    pub const BIT_RATE: u32 = 50_000;

    /// Lowest bit rate the fractional divider reaches from the reference clock
    pub const MIN_BIT_RATE: u32 = 16_000;

    /// Reference clock feeding the transmitter in Hz
    pub const REFERENCE_CLOCK_HZ: u32 = 20_000_000;

    /// Transmit buffer capacity in bytes, framing byte included
    pub const BUFFER_CAPACITY: usize = 255;

    /// Largest payload accepted behind the framing byte
    pub const MAX_PAYLOAD: usize = BUFFER_CAPACITY - 1;

    /// Framing byte sent ahead of every packet
    pub const START_BYTE: u8 = 0x55;

    /// Numerator of the guard interval formula, `ceil(GUARD_NUMERATOR / bit_rate)`
    pub const GUARD_NUMERATOR: u32 = 2_048_000;

    /// Duration of one guard tick in microseconds
    pub const GUARD_TICK_US: u32 = 250;

    /// Manchester encoding emits two line levels per data bit
    pub const HALF_BITS_PER_BYTE: usize = 16;
}

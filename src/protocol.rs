//! Byte-ready state machine draining the transmit buffer

use crate::buffer::TransmitBuffer;
use crate::transmitter::SerialTransmitter;

/// State of the transmit path after a byte-ready event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TxState {
    /// Interrupt disabled, buffer released, cursor at 0
    #[default]
    Idle,
    /// Interrupt enabled, bytes of the current packet still to load
    Draining,
}

impl std::fmt::Display for TxState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxState::Idle => write!(f, "Idle"),
            TxState::Draining => write!(f, "Draining"),
        }
    }
}

/// Counters kept by the byte-ready handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkStats {
    /// Packets drained completely
    pub packets_sent: u64,
    /// Bytes written to the transmitter, framing bytes included
    pub bytes_sent: u64,
}

/// Consumer side of the transmit buffer, run from byte-ready context
///
/// Owns the transmission cursor, which persists across events and is reset
/// only when a packet completes.
#[derive(Debug, Default)]
pub struct TransmitStateMachine {
    cursor: usize,
    state: TxState,
    stats: LinkStats,
}

impl TransmitStateMachine {
    /// Create an idle state machine
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle one byte-ready event
    ///
    /// Loads the next framed byte while the cursor is behind the packet
    /// length. Once every byte has been loaded, the next event resets the
    /// cursor, disables the interrupt and releases the buffer. An event that
    /// arrives while no packet is in flight only does the latter.
    pub fn on_byte_ready<T>(&mut self, buffer: &TransmitBuffer, tx: &T) -> TxState
    where
        T: SerialTransmitter + ?Sized,
    {
        let length = buffer.len();
        debug_assert!(
            self.cursor <= length,
            "cursor {} past packet length {}",
            self.cursor,
            length
        );

        // Only a completely published packet belongs to this context
        let next = if buffer.is_ready() {
            buffer.byte_at(self.cursor)
        } else {
            None
        };

        match next {
            Some(byte) => {
                tx.load_byte(byte);
                log::trace!("loaded byte {}/{}: {:#04x}", self.cursor + 1, length, byte);
                self.cursor += 1;
                self.stats.bytes_sent += 1;
                self.state = TxState::Draining;
            }
            None => {
                if self.state == TxState::Draining {
                    self.stats.packets_sent += 1;
                    log::debug!("packet complete: {} bytes", self.cursor);
                }
                self.cursor = 0;
                tx.disable_interrupt();
                buffer.release();
                self.state = TxState::Idle;
            }
        }

        self.state
    }

    /// Index of the next byte to load
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// State after the last handled event
    pub fn state(&self) -> TxState {
        self.state
    }

    /// Transmission counters
    pub fn stats(&self) -> LinkStats {
        self.stats
    }
}

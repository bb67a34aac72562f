//! Framed transmit buffer shared by the foreground loop and the byte-ready handler

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use crate::core::Packet;
use crate::defaults;

/// Slot is free for the next packet
const IDLE: u8 = 0;
/// A producer claimed the slot and is copying its payload
const FILLING: u8 = 1;
/// Packet complete and owned by the byte-ready handler
const SENDING: u8 = 2;

/// Single-slot transmit buffer guarded by a busy flag
///
/// Offset 0 holds the framing byte, written once at construction. A producer
/// claims the slot with a compare-exchange from idle to filling, so only one
/// submission can win even if several contexts race. Contents and length are
/// published by the `Release` store that marks the slot as sending, and only
/// the byte-ready handler moves it from sending back to idle.
#[derive(Debug)]
pub struct TransmitBuffer {
    data: [AtomicU8; defaults::BUFFER_CAPACITY],
    length: AtomicUsize,
    state: AtomicU8,
}

impl TransmitBuffer {
    /// Buffer capacity in bytes, framing byte included
    pub const CAPACITY: usize = defaults::BUFFER_CAPACITY;

    /// Create an idle buffer framed with the default start byte
    pub fn new() -> Self {
        Self::with_start_byte(defaults::START_BYTE)
    }

    /// Create an idle buffer framed with `start_byte`
    pub fn with_start_byte(start_byte: u8) -> Self {
        let data: [AtomicU8; defaults::BUFFER_CAPACITY] =
            std::array::from_fn(|_| AtomicU8::new(0));
        data[0].store(start_byte, Ordering::Relaxed);

        TransmitBuffer {
            data,
            length: AtomicUsize::new(0),
            state: AtomicU8::new(IDLE),
        }
    }

    /// Hand a packet to the byte-ready handler
    ///
    /// Returns `false` without touching the buffer while a previous packet
    /// is still in flight or another submission holds the slot.
    pub fn try_submit(&self, packet: &Packet<'_>) -> bool {
        if self
            .state
            .compare_exchange(IDLE, FILLING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }

        for (slot, &byte) in self.data[1..].iter().zip(packet.payload()) {
            slot.store(byte, Ordering::Relaxed);
        }
        self.length.store(packet.framed_len(), Ordering::Release);
        self.state.store(SENDING, Ordering::Release);

        log::debug!("packet queued: {} bytes framed", packet.framed_len());
        true
    }

    /// Check whether a packet is in flight or being copied in
    pub fn is_sending(&self) -> bool {
        self.state.load(Ordering::Acquire) != IDLE
    }

    /// Check whether a complete packet is ready for the byte-ready handler
    pub(crate) fn is_ready(&self) -> bool {
        self.state.load(Ordering::Acquire) == SENDING
    }

    /// Number of framed bytes of the current (or last) packet
    pub fn len(&self) -> usize {
        self.length.load(Ordering::Acquire)
    }

    /// Check if no packet has been submitted yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffer capacity in bytes
    pub fn capacity(&self) -> usize {
        Self::CAPACITY
    }

    /// Framing byte at offset 0
    pub fn start_byte(&self) -> u8 {
        self.data[0].load(Ordering::Relaxed)
    }

    /// Byte at `index` of the framed packet, `None` past its length
    pub fn byte_at(&self, index: usize) -> Option<u8> {
        if index < self.len() {
            Some(self.data[index].load(Ordering::Relaxed))
        } else {
            None
        }
    }

    /// Copy of the framed packet currently held
    pub fn framed(&self) -> Vec<u8> {
        (0..self.len())
            .map(|i| self.data[i].load(Ordering::Relaxed))
            .collect()
    }

    /// Release the buffer once the handler has drained it
    ///
    /// A slot that is still being filled stays with its producer.
    pub(crate) fn release(&self) {
        if self
            .state
            .compare_exchange(SENDING, IDLE, Ordering::Release, Ordering::Relaxed)
            .is_err()
        {
            log::trace!("release skipped: no packet in flight");
        }
    }
}

impl Default for TransmitBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;

    #[test]
    fn test_new_buffer_is_idle() {
        let buffer = TransmitBuffer::new();
        assert!(!buffer.is_sending());
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 255);
        assert_eq!(buffer.start_byte(), 0x55);
        assert_eq!(buffer.byte_at(0), None);
    }

    #[test]
    fn test_submit_frames_payload() -> Result<()> {
        let buffer = TransmitBuffer::new();
        let packet = Packet::new(b"Hi!")?;

        assert!(buffer.try_submit(&packet));
        assert!(buffer.is_sending());
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.framed(), vec![0x55, b'H', b'i', b'!']);
        assert_eq!(buffer.byte_at(3), Some(b'!'));
        assert_eq!(buffer.byte_at(4), None);
        Ok(())
    }

    #[test]
    fn test_busy_rejection_has_no_side_effect() -> Result<()> {
        let buffer = TransmitBuffer::new();
        assert!(buffer.try_submit(&Packet::new(b"first")?));
        assert!(!buffer.try_submit(&Packet::new(b"second packet")?));

        assert_eq!(buffer.len(), 6);
        assert_eq!(buffer.framed(), b"\x55first".to_vec());
        Ok(())
    }

    #[test]
    fn test_release_allows_next_submit() -> Result<()> {
        let buffer = TransmitBuffer::new();
        assert!(buffer.try_submit(&Packet::new(b"one")?));
        buffer.release();
        assert!(buffer.try_submit(&Packet::new(b"two!")?));
        assert_eq!(buffer.framed(), b"\x55two!".to_vec());
        Ok(())
    }

    #[test]
    fn test_start_byte_never_overwritten() -> Result<()> {
        let buffer = TransmitBuffer::with_start_byte(0xA5);
        let full = [0xFFu8; 254];
        assert!(buffer.try_submit(&Packet::new(&full)?));
        assert_eq!(buffer.len(), 255);
        assert_eq!(buffer.byte_at(0), Some(0xA5));
        assert_eq!(buffer.byte_at(254), Some(0xFF));
        Ok(())
    }

    #[test]
    fn test_concurrent_submissions_claim_one_slot() -> Result<()> {
        use std::sync::atomic::AtomicUsize;
        use std::sync::Barrier;

        const ROUNDS: usize = 2_000;

        let buffer = TransmitBuffer::new();
        let first = [0xAAu8; 200];
        let second = [0xBBu8; 200];
        let packets = [Packet::new(&first)?, Packet::new(&second)?];
        let barrier = Barrier::new(3);
        let accepted = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for packet in &packets {
                let (buffer, barrier, accepted) = (&buffer, &barrier, &accepted);
                s.spawn(move || {
                    for _ in 0..ROUNDS {
                        barrier.wait();
                        if buffer.try_submit(packet) {
                            accepted.fetch_add(1, Ordering::SeqCst);
                        }
                        barrier.wait();
                    }
                });
            }

            for _ in 0..ROUNDS {
                barrier.wait();
                barrier.wait();

                assert_eq!(accepted.swap(0, Ordering::SeqCst), 1);
                let frame = buffer.framed();
                assert_eq!(frame.len(), 201);
                assert_eq!(frame[0], 0x55);
                assert!(frame[1..].iter().all(|&b| b == frame[1]));
                buffer.release();
            }
        });
        Ok(())
    }

    #[test]
    fn test_release_ignores_idle_slot() -> Result<()> {
        let buffer = TransmitBuffer::new();
        buffer.release();
        assert!(!buffer.is_sending());
        assert!(buffer.try_submit(&Packet::new(b"ok")?));
        assert!(buffer.is_ready());
        Ok(())
    }

    #[test]
    fn test_buffer_is_sync() {
        fn assert_sync<T: Sync + Send>() {}
        assert_sync::<TransmitBuffer>();
    }
}

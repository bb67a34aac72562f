//! Packet scheduling and link assembly

use std::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::buffer::TransmitBuffer;
use crate::core::{BitRate, LinkConfig, Packet};
use crate::defaults;
use crate::encoding::{configure_encoder, EncodingConvention, LineEncoder};
use crate::error::Result;
use crate::protocol::{LinkStats, TransmitStateMachine, TxState};
use crate::transmitter::SerialTransmitter;

/// Idle time enforced between the end of one packet and the next
///
/// Lasts `ceil(GUARD_NUMERATOR / bit_rate)` ticks of `GUARD_TICK_US`, a
/// little over one byte period, so the line settles and receivers can
/// resynchronize on the next framing byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardInterval {
    ticks: u32,
}

impl GuardInterval {
    /// Numerator of the tick count formula
    pub const NUMERATOR: u32 = defaults::GUARD_NUMERATOR;
    /// Duration of one tick in microseconds
    pub const TICK_US: u32 = defaults::GUARD_TICK_US;

    /// Guard interval for a bit rate
    pub fn for_bit_rate(bit_rate: BitRate) -> Self {
        GuardInterval {
            ticks: Self::NUMERATOR.div_ceil(bit_rate.value()),
        }
    }

    /// Number of ticks to wait
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Duration of one tick
    pub fn tick(&self) -> Duration {
        Duration::from_micros(u64::from(Self::TICK_US))
    }

    /// Total guard duration
    pub fn total(&self) -> Duration {
        self.tick() * self.ticks
    }

    /// Busy-wait for the whole interval
    pub fn wait<D: DelayNs>(&self, delay: &mut D) {
        for _ in 0..self.ticks {
            delay.delay_us(Self::TICK_US);
        }
    }
}

/// Result of handing a packet to the transmit buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Guard interval elapsed and the byte-ready interrupt was re-armed
    Armed,
    /// Interrupt was already armed; the packet drains without a new guard
    Queued,
}

/// Foreground producer: submits packets and re-arms the transmitter
#[derive(Debug)]
pub struct PacketScheduler<D> {
    guard: GuardInterval,
    delay: D,
    busy_polls: u64,
}

impl<D: DelayNs> PacketScheduler<D> {
    /// Create a scheduler waiting `guard` between packets
    pub fn new(guard: GuardInterval, delay: D) -> Self {
        PacketScheduler {
            guard,
            delay,
            busy_polls: 0,
        }
    }

    /// Guard interval used between packets
    pub fn guard(&self) -> GuardInterval {
        self.guard
    }

    /// Rejected submissions seen while busy-polling
    pub fn busy_polls(&self) -> u64 {
        self.busy_polls
    }

    /// Delay provider
    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// Make a single submission attempt
    ///
    /// Returns `None` if a packet is still in flight.
    pub fn try_step<T>(
        &mut self,
        buffer: &TransmitBuffer,
        tx: &T,
        packet: &Packet<'_>,
    ) -> Option<SubmitOutcome>
    where
        T: SerialTransmitter + ?Sized,
    {
        if !buffer.try_submit(packet) {
            self.busy_polls += 1;
            return None;
        }
        Some(self.arm(tx))
    }

    /// Busy-poll until the packet is accepted, then arm the transmitter
    ///
    /// Only returns once the byte-ready handler has released the previous
    /// packet, so it must not be called from that handler's context.
    pub fn submit<T>(
        &mut self,
        buffer: &TransmitBuffer,
        tx: &T,
        packet: &Packet<'_>,
    ) -> SubmitOutcome
    where
        T: SerialTransmitter + ?Sized,
    {
        loop {
            if let Some(outcome) = self.try_step(buffer, tx, packet) {
                return outcome;
            }
            std::hint::spin_loop();
        }
    }

    /// Submit the same packet `iterations` times
    pub fn run<T>(
        &mut self,
        buffer: &TransmitBuffer,
        tx: &T,
        packet: &Packet<'_>,
        iterations: usize,
    ) where
        T: SerialTransmitter + ?Sized,
    {
        for _ in 0..iterations {
            self.submit(buffer, tx, packet);
        }
    }

    fn arm<T>(&mut self, tx: &T) -> SubmitOutcome
    where
        T: SerialTransmitter + ?Sized,
    {
        if tx.interrupt_enabled() {
            return SubmitOutcome::Queued;
        }
        log::debug!(
            "guard interval: {} ticks ({:?})",
            self.guard.ticks(),
            self.guard.total()
        );
        self.guard.wait(&mut self.delay);
        tx.enable_interrupt();
        SubmitOutcome::Armed
    }
}

/// A configured link: transmit buffer, byte-ready state machine, and the
/// transmitter and line encoder they drive
#[derive(Debug)]
pub struct Link<T, E> {
    config: LinkConfig,
    buffer: TransmitBuffer,
    machine: TransmitStateMachine,
    tx: T,
    encoder: E,
}

impl<T: SerialTransmitter, E: LineEncoder> Link<T, E> {
    /// Configuration the link was built with
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Shared transmit buffer
    pub fn buffer(&self) -> &TransmitBuffer {
        &self.buffer
    }

    /// Serial transmitter
    pub fn transmitter(&self) -> &T {
        &self.tx
    }

    /// Line encoder
    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// State of the byte-ready state machine
    pub fn state(&self) -> TxState {
        self.machine.state()
    }

    /// Transmission counters
    pub fn stats(&self) -> LinkStats {
        self.machine.stats()
    }

    /// Guard interval for the configured bit rate
    pub fn guard(&self) -> GuardInterval {
        GuardInterval::for_bit_rate(self.config.bit_rate)
    }

    /// Create the foreground scheduler for this link
    pub fn scheduler<D: DelayNs>(&self, delay: D) -> PacketScheduler<D> {
        PacketScheduler::new(self.guard(), delay)
    }

    /// Run the byte-ready handler once
    pub fn on_byte_ready(&mut self) -> TxState {
        self.machine.on_byte_ready(&self.buffer, &self.tx)
    }

    /// Split the link into its foreground and byte-ready halves
    ///
    /// The halves can be moved into different execution contexts for the
    /// lifetime of the borrow.
    pub fn split(&mut self) -> (Foreground<'_, T>, ByteReadyHandler<'_, T>) {
        let foreground = Foreground {
            buffer: &self.buffer,
            tx: &self.tx,
        };
        let handler = ByteReadyHandler {
            buffer: &self.buffer,
            tx: &self.tx,
            machine: &mut self.machine,
        };
        (foreground, handler)
    }
}

/// Foreground half of a split link
#[derive(Debug, Clone, Copy)]
pub struct Foreground<'a, T> {
    buffer: &'a TransmitBuffer,
    tx: &'a T,
}

impl<'a, T: SerialTransmitter> Foreground<'a, T> {
    /// Shared transmit buffer
    pub fn buffer(&self) -> &'a TransmitBuffer {
        self.buffer
    }

    /// Serial transmitter
    pub fn transmitter(&self) -> &'a T {
        self.tx
    }

    /// Busy-poll `packet` into the buffer through `scheduler`
    pub fn submit<D: DelayNs>(
        &self,
        scheduler: &mut PacketScheduler<D>,
        packet: &Packet<'_>,
    ) -> SubmitOutcome {
        scheduler.submit(self.buffer, self.tx, packet)
    }
}

/// Byte-ready half of a split link
#[derive(Debug)]
pub struct ByteReadyHandler<'a, T> {
    buffer: &'a TransmitBuffer,
    tx: &'a T,
    machine: &'a mut TransmitStateMachine,
}

impl<'a, T: SerialTransmitter> ByteReadyHandler<'a, T> {
    /// Handle one byte-ready event
    pub fn on_byte_ready(&mut self) -> TxState {
        self.machine.on_byte_ready(self.buffer, self.tx)
    }

    /// Transmission counters
    pub fn stats(&self) -> LinkStats {
        self.machine.stats()
    }
}

/// Builder for a [`Link`]
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    bit_rate: u32,
    prescaled: bool,
    convention: EncodingConvention,
    start_byte: u8,
}

impl LinkBuilder {
    /// Create a new link builder with the default settings
    pub fn new() -> Self {
        LinkBuilder {
            bit_rate: defaults::BIT_RATE,
            prescaled: false,
            convention: EncodingConvention::default(),
            start_byte: defaults::START_BYTE,
        }
    }

    /// Set the bit rate
    pub fn with_bit_rate(mut self, bit_rate: u32) -> Self {
        self.bit_rate = bit_rate;
        self
    }

    /// Declare that the transmitter clock is prescaled
    pub fn with_prescaler(mut self, prescaled: bool) -> Self {
        self.prescaled = prescaled;
        self
    }

    /// Set the encoding convention
    pub fn with_convention(mut self, convention: EncodingConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Set the framing byte
    pub fn with_start_byte(mut self, start_byte: u8) -> Self {
        self.start_byte = start_byte;
        self
    }

    /// Validate the settings into a link configuration
    pub fn config(&self) -> Result<LinkConfig> {
        let bit_rate = if self.prescaled {
            BitRate::with_prescaler(self.bit_rate)?
        } else {
            BitRate::new(self.bit_rate)?
        };
        Ok(LinkConfig::new(bit_rate, self.convention))
    }

    /// Program the line encoder, then initialize the transmitter
    pub fn build<T, E>(self, tx: T, encoder: E) -> Result<Link<T, E>>
    where
        T: SerialTransmitter,
        E: LineEncoder,
    {
        let config = self.config()?;

        configure_encoder(&encoder, config.convention);
        tx.initialize(&config)?;
        log::info!("link ready: {}", config);

        Ok(Link {
            config,
            buffer: TransmitBuffer::with_start_byte(self.start_byte),
            machine: TransmitStateMachine::new(),
            tx,
            encoder,
        })
    }
}

impl Default for LinkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! Register-level simulation of the transmitter and logic cell
//!
//! [`SimUsart`] models a USART running in master SPI mode and [`SimCcl`]
//! models look-up table 0 of a configurable custom logic block. Together they
//! reproduce the line the hardware drives, so the link can be exercised
//! without a target.

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU8, Ordering};
use std::sync::Mutex;

use bitfield::bitfield;

use crate::core::LinkConfig;
use crate::defaults;
use crate::encoding::{EncodingConvention, LineEncoder, ManchesterEncoder};
use crate::error::{LinkError, Result};
use crate::transmitter::SerialTransmitter;

bitfield! {
    /// USART control register A
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct UsartCtrlA(u8);
    impl Debug;
    // Receive complete interrupt enable
    pub rxcie, set_rxcie: 7;
    // Transmit complete interrupt enable
    pub txcie, set_txcie: 6;
    // Data register empty interrupt enable
    pub dreie, set_dreie: 5;
}

bitfield! {
    /// USART control register B
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct UsartCtrlB(u8);
    impl Debug;
    // Receiver enable
    pub rxen, set_rxen: 7;
    // Transmitter enable
    pub txen, set_txen: 6;
}

bitfield! {
    /// USART control register C, master SPI layout
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct UsartCtrlC(u8);
    impl Debug;
    // Communication mode
    pub u8, cmode, set_cmode: 7, 6;
    // Data order, set for LSB first
    pub udord, set_udord: 2;
    // Clock phase
    pub ucpha, set_ucpha: 1;
}

bitfield! {
    /// CCL look-up table control register A
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct LutCtrlA(u8);
    impl Debug;
    // Output enable
    pub outen, set_outen: 3;
    // Look-up table enable
    pub enable, set_enable: 0;
}

bitfield! {
    /// CCL control register A
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct CclCtrlA(u8);
    impl Debug;
    // Run in standby
    pub runstdby, set_runstdby: 6;
    // Peripheral enable
    pub enable, set_enable: 0;
}

/// Communication mode value selecting master SPI
pub const CMODE_MSPI: u8 = 0b11;

/// Width of the integer part of the master SPI baud register
const BAUD_INTEGER_BITS: u32 = 10;

/// Baud register value realizing `bit_rate` in master SPI mode
///
/// The integer divider lives in bits 15:6 and the bit rate is
/// `clock_hz / (2 * divider)`.
pub fn mspi_baud_register(clock_hz: u32, bit_rate: u32) -> Result<u16> {
    if bit_rate == 0 {
        return Err(LinkError::invalid_bit_rate("bit rate must be non-zero"));
    }
    let divider = bit_rate
        .checked_mul(2)
        .map_or(0, |half_bit_rate| clock_hz / half_bit_rate);
    if divider == 0 || divider >= (1 << BAUD_INTEGER_BITS) {
        return Err(LinkError::invalid_bit_rate(format!(
            "{} bit/s is not reachable from a {} Hz clock",
            bit_rate, clock_hz
        )));
    }
    Ok((divider << 6) as u16)
}

/// Simulated USART in master SPI mode
///
/// Loaded bytes are appended to an in-memory wire. The data register is
/// empty again once [`SimUsart::poll_byte_ready`] lets the pending byte move
/// into the shift register.
#[derive(Debug)]
pub struct SimUsart {
    clock_hz: u32,
    ctrla: AtomicU8,
    ctrlb: AtomicU8,
    ctrlc: AtomicU8,
    baud: AtomicU16,
    data_register_empty: AtomicBool,
    wire: Mutex<Vec<u8>>,
}

impl SimUsart {
    /// Create a USART clocked from the reference clock
    pub fn new() -> Self {
        Self::with_clock(defaults::REFERENCE_CLOCK_HZ)
    }

    /// Create a USART clocked at `clock_hz`, e.g. behind a prescaler
    pub fn with_clock(clock_hz: u32) -> Self {
        SimUsart {
            clock_hz,
            ctrla: AtomicU8::new(0),
            ctrlb: AtomicU8::new(0),
            ctrlc: AtomicU8::new(0),
            baud: AtomicU16::new(0),
            data_register_empty: AtomicBool::new(true),
            wire: Mutex::new(Vec::new()),
        }
    }

    /// Peripheral clock in Hz
    pub fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    /// Control register A
    pub fn ctrla(&self) -> UsartCtrlA {
        UsartCtrlA(self.ctrla.load(Ordering::Acquire))
    }

    /// Control register B
    pub fn ctrlb(&self) -> UsartCtrlB {
        UsartCtrlB(self.ctrlb.load(Ordering::Acquire))
    }

    /// Control register C
    pub fn ctrlc(&self) -> UsartCtrlC {
        UsartCtrlC(self.ctrlc.load(Ordering::Acquire))
    }

    /// Baud register
    pub fn baud(&self) -> u16 {
        self.baud.load(Ordering::Acquire)
    }

    /// Bit rate currently produced by the baud register
    pub fn effective_bit_rate(&self) -> Option<u32> {
        let divider = u32::from(self.baud() >> 6);
        (divider != 0).then(|| self.clock_hz / (2 * divider))
    }

    /// Data register empty flag
    pub fn data_register_empty(&self) -> bool {
        self.data_register_empty.load(Ordering::Acquire)
    }

    /// Advance the shift register and report whether a byte-ready
    /// interrupt is pending
    pub fn poll_byte_ready(&self) -> bool {
        self.data_register_empty.store(true, Ordering::Release);
        self.ctrla().dreie()
    }

    /// Bytes shifted out so far
    pub fn wire(&self) -> Vec<u8> {
        self.wire.lock().map(|w| w.clone()).unwrap_or_default()
    }

    /// Discard the recorded wire contents
    pub fn clear_wire(&self) {
        if let Ok(mut wire) = self.wire.lock() {
            wire.clear();
        }
    }

    fn modify_ctrla(&self, f: impl Fn(&mut UsartCtrlA)) {
        // Both contexts write CTRLA; retry until the read-modify-write lands
        let mut current = self.ctrla.load(Ordering::Acquire);
        loop {
            let mut reg = UsartCtrlA(current);
            f(&mut reg);
            match self.ctrla.compare_exchange_weak(
                current,
                reg.0,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for SimUsart {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialTransmitter for SimUsart {
    fn initialize(&self, config: &LinkConfig) -> Result<()> {
        if self.ctrla().dreie() {
            return Err(LinkError::not_ready(
                "byte-ready interrupt enabled during initialization",
            ));
        }

        let baud = mspi_baud_register(self.clock_hz, config.bit_rate.value())?;

        let mut ctrlc = UsartCtrlC(0);
        ctrlc.set_cmode(CMODE_MSPI);
        ctrlc.set_ucpha(true);
        self.ctrlc.store(ctrlc.0, Ordering::Release);

        self.baud.store(baud, Ordering::Release);

        let mut ctrlb = UsartCtrlB(0);
        ctrlb.set_txen(true);
        self.ctrlb.store(ctrlb.0, Ordering::Release);

        log::info!(
            "USART initialized: master SPI, {} (BAUD={:#06x})",
            config.bit_rate,
            baud
        );
        Ok(())
    }

    fn enable_interrupt(&self) {
        self.modify_ctrla(|reg| reg.set_dreie(true));
    }

    fn disable_interrupt(&self) {
        self.modify_ctrla(|reg| reg.set_dreie(false));
    }

    fn interrupt_enabled(&self) -> bool {
        self.ctrla().dreie()
    }

    fn load_byte(&self, byte: u8) {
        if !self.ctrlb().txen() {
            log::warn!("USART write of {:#04x} ignored: transmitter disabled", byte);
            return;
        }
        if let Ok(mut wire) = self.wire.lock() {
            wire.push(byte);
        }
        self.data_register_empty.store(false, Ordering::Release);
    }
}

/// Simulated configurable custom logic, look-up table 0
#[derive(Debug, Default)]
pub struct SimCcl {
    truth0: AtomicU8,
    lut0ctrla: AtomicU8,
    ctrla: AtomicU8,
}

impl SimCcl {
    /// Create a disabled logic cell
    pub fn new() -> Self {
        Self::default()
    }

    /// Truth table register of look-up table 0
    pub fn truth0(&self) -> u8 {
        self.truth0.load(Ordering::Acquire)
    }

    /// Control register A of look-up table 0
    pub fn lut0ctrla(&self) -> LutCtrlA {
        LutCtrlA(self.lut0ctrla.load(Ordering::Acquire))
    }

    /// Peripheral control register A
    pub fn ctrla(&self) -> CclCtrlA {
        CclCtrlA(self.ctrla.load(Ordering::Acquire))
    }

    /// Check if both the look-up table and the peripheral are enabled
    pub fn is_enabled(&self) -> bool {
        self.lut0ctrla().enable() && self.ctrla().enable()
    }

    /// Line levels driven for `bytes` shifted out of the transmitter
    pub fn line_levels(&self, bytes: &[u8]) -> Result<Vec<bool>> {
        if !self.is_enabled() {
            return Err(LinkError::encoder_disabled("CCL LUT0 is not enabled"));
        }
        Ok(ManchesterEncoder::line_levels_with_table(bytes, self.truth0()))
    }
}

impl LineEncoder for SimCcl {
    fn configure(&self, convention: EncodingConvention) {
        self.truth0
            .store(convention.truth_table(), Ordering::Release);

        let mut lut = self.lut0ctrla();
        lut.set_enable(true);
        self.lut0ctrla.store(lut.0, Ordering::Release);

        let mut ctrla = self.ctrla();
        ctrla.set_enable(true);
        self.ctrla.store(ctrla.0, Ordering::Release);
    }

    fn convention(&self) -> Option<EncodingConvention> {
        if !self.is_enabled() {
            return None;
        }
        EncodingConvention::from_truth_table(self.truth0()).ok()
    }
}

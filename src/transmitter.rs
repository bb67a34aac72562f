//! Serial transmitter interface

use crate::core::LinkConfig;
use crate::error::Result;

/// Shift-register transmitter that raises a byte-ready event when empty
///
/// Register writes happen from both the foreground loop and the byte-ready
/// handler, so every method takes `&self`, the same way memory-mapped
/// registers are shared.
pub trait SerialTransmitter {
    /// Enter master-synchronous mode at `config.bit_rate` and enable the
    /// transmit path, leaving the byte-ready interrupt disabled
    fn initialize(&self, config: &LinkConfig) -> Result<()>;

    /// Let byte-ready events reach the handler
    fn enable_interrupt(&self);

    /// Stop byte-ready events from reaching the handler
    fn disable_interrupt(&self);

    /// Check whether byte-ready events currently reach the handler
    fn interrupt_enabled(&self) -> bool;

    /// Write one byte into the data register
    fn load_byte(&self, byte: u8);
}

impl<T: SerialTransmitter + ?Sized> SerialTransmitter for &T {
    fn initialize(&self, config: &LinkConfig) -> Result<()> {
        (**self).initialize(config)
    }

    fn enable_interrupt(&self) {
        (**self).enable_interrupt()
    }

    fn disable_interrupt(&self) {
        (**self).disable_interrupt()
    }

    fn interrupt_enabled(&self) -> bool {
        (**self).interrupt_enabled()
    }

    fn load_byte(&self, byte: u8) {
        (**self).load_byte(byte)
    }
}

impl<T: SerialTransmitter + ?Sized> SerialTransmitter for std::sync::Arc<T> {
    fn initialize(&self, config: &LinkConfig) -> Result<()> {
        (**self).initialize(config)
    }

    fn enable_interrupt(&self) {
        (**self).enable_interrupt()
    }

    fn disable_interrupt(&self) {
        (**self).disable_interrupt()
    }

    fn interrupt_enabled(&self) -> bool {
        (**self).interrupt_enabled()
    }

    fn load_byte(&self, byte: u8) {
        (**self).load_byte(byte)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Transmitter that records every loaded byte
    #[derive(Debug, Default)]
    pub(crate) struct RecordingTransmitter {
        pub(crate) interrupt: AtomicBool,
        pub(crate) loaded: Mutex<Vec<u8>>,
        pub(crate) config: Mutex<Option<LinkConfig>>,
    }

    impl RecordingTransmitter {
        pub(crate) fn loaded(&self) -> Vec<u8> {
            self.loaded.lock().unwrap().clone()
        }
    }

    impl SerialTransmitter for RecordingTransmitter {
        fn initialize(&self, config: &LinkConfig) -> Result<()> {
            *self.config.lock().unwrap() = Some(*config);
            self.interrupt.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn enable_interrupt(&self) {
            self.interrupt.store(true, Ordering::SeqCst);
        }

        fn disable_interrupt(&self) {
            self.interrupt.store(false, Ordering::SeqCst);
        }

        fn interrupt_enabled(&self) -> bool {
            self.interrupt.load(Ordering::SeqCst)
        }

        fn load_byte(&self, byte: u8) {
            self.loaded.lock().unwrap().push(byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::RecordingTransmitter;
    use super::*;

    #[test]
    fn test_reference_forwarding() -> Result<()> {
        let tx = RecordingTransmitter::default();
        let by_ref = &tx;
        by_ref.initialize(&LinkConfig::default())?;
        assert_eq!(*tx.config.lock().unwrap(), Some(LinkConfig::default()));
        by_ref.enable_interrupt();
        assert!(tx.interrupt_enabled());
        by_ref.load_byte(0x55);
        by_ref.disable_interrupt();
        assert!(!tx.interrupt_enabled());
        assert_eq!(tx.loaded(), vec![0x55]);
        Ok(())
    }
}

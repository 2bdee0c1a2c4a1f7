//! BL808 UART transmit path.
//!
//! The primary bootloader has already set up pins, clock and baud rate for
//! the D0 console, so only the TX FIFO is touched here.

use bootcore::Serial;

use crate::mmio;

/// FIFO config 1: `tx_fifo_cnt` in bits [5:0] is the free TX space.
const UART_FIFO_CONFIG_1: usize = 0x84;
const TX_FIFO_FREE_MASK: u32 = 0x3F;

/// TX FIFO write data.
const UART_FIFO_WDATA: usize = 0x88;

pub struct Uart {
    base: usize,
}

impl Uart {
    /// # Safety
    /// `base` must be the register block of an initialized BL808 UART.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    fn tx_free(&self) -> u32 {
        mmio::read(self.base + UART_FIFO_CONFIG_1) & TX_FIFO_FREE_MASK
    }
}

impl Serial for Uart {
    fn write_byte(&mut self, byte: u8) {
        while self.tx_free() == 0 {
            core::hint::spin_loop();
        }
        mmio::write(self.base + UART_FIFO_WDATA, byte as u32);
    }
}

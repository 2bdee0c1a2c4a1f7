//! Memory-mapped I/O
//!
//! Volatile register access for BL808 peripherals.

use core::ptr::{read_volatile, write_volatile};

/// Read a 32-bit value from a memory-mapped register.
#[inline(always)]
pub fn read(addr: usize) -> u32 {
    unsafe { read_volatile(addr as *const u32) }
}

/// Write a 32-bit value to a memory-mapped register.
#[inline(always)]
pub fn write(addr: usize, value: u32) {
    unsafe { write_volatile(addr as *mut u32, value) }
}

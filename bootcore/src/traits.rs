//! Platform abstraction traits.
//!
//! These traits define the interface each platform must implement to
//! drive the loader. On target they are backed by the C906 core and the
//! BL808 memory map; in tests they are backed by plain buffers.

use crate::error::{DecompressError, Result};
use crate::pmp::PmpTable;

/// Serial/UART interface for the early console.
pub trait Serial {
    /// Write a single byte, blocking until accepted by the FIFO.
    fn write_byte(&mut self, byte: u8);

    /// Write a byte slice.
    fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_byte(b);
        }
    }

    /// Write a string.
    fn write_str(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }
}

/// L1 data cache maintenance.
///
/// Both operations are best-effort hardware maintenance with no failure
/// path.
pub trait DataCache {
    /// Drop any cached copy of `addr .. addr + len` so the next read
    /// observes memory.
    fn invalidate_range(&mut self, addr: usize, len: usize);

    /// Write back every dirty line and invalidate the whole cache.
    fn clean_invalidate_all(&mut self);
}

/// Read access to flash by absolute flash offset.
pub trait FlashRead {
    /// Invalidate the cached copy of exactly `offset .. offset + len`,
    /// then return a view of it.
    fn read(&mut self, offset: u32, len: usize) -> Result<&[u8]>;
}

/// Write access to physical RAM.
pub trait PhysMemory {
    /// Mutable view of `len` bytes of RAM starting at physical `addr`.
    ///
    /// # Safety
    /// The range must be RAM that nothing else in this stage is using.
    unsafe fn region_mut(&mut self, addr: usize, len: usize) -> &mut [u8];

    /// Make every staged write visible to instruction fetch and to the next
    /// stage.
    fn publish(&mut self);
}

/// Decompression collaborator.
pub trait Decompressor {
    /// Decode `src` into the start of `dst`, returning the number of bytes
    /// produced.
    fn decompress(
        &mut self,
        src: &[u8],
        dst: &mut [u8],
    ) -> core::result::Result<usize, DecompressError>;
}

/// The boot hart as seen by the handoff controller.
pub trait Cpu {
    /// Identifier of the hart running the loader.
    fn hart_id(&self) -> usize;

    /// Final core feature configuration required by the next stage.
    fn finalize_core_config(&mut self);

    /// Install `table` as the active PMP policy in one step.
    fn install_pmp(&mut self, table: &PmpTable);

    /// Jump to `entry` with `(hart_id, dtb)` as the first two arguments.
    ///
    /// # Safety
    /// `entry` must hold executable code that follows the firmware entry
    /// contract. Control does not come back.
    unsafe fn enter(&mut self, entry: usize, hart_id: usize, dtb: usize) -> !;

    /// Park the hart in a low-power wait forever.
    fn idle(&mut self) -> !;
}

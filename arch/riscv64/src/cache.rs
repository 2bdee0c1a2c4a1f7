//! C906 L1 data cache maintenance.
//!
//! The C906 has no Zicbom; maintenance goes through the T-Head custom
//! instructions. They are emitted as raw words so any assembler accepts
//! them, with the address operand fixed in `a0`.

use bootcore::DataCache;

/// L1 D-cache line size.
pub const CACHE_LINE: usize = 64;

/// Invalidate every line overlapping `addr .. addr + len`.
pub fn invalidate_range(addr: usize, len: usize) {
    if len == 0 {
        return;
    }
    let end = addr.saturating_add(len);
    let mut line = addr & !(CACHE_LINE - 1);
    while line < end {
        unsafe {
            // dcache.ipa a0
            core::arch::asm!(".long 0x02a5000b", in("a0") line, options(nostack));
        }
        line += CACHE_LINE;
    }
    sync_s();
}

/// Write back and invalidate the whole D-cache.
pub fn clean_invalidate_all() {
    unsafe {
        // dcache.ciall
        core::arch::asm!(".long 0x0030000b", options(nostack));
    }
    sync_is();
}

/// `sync.s`: wait until every cache operation has completed.
#[inline]
pub fn sync_s() {
    unsafe {
        core::arch::asm!(".long 0x0190000b", options(nostack));
    }
}

/// `sync.is`: as `sync.s`, then flush the pipeline.
#[inline]
pub fn sync_is() {
    unsafe {
        core::arch::asm!(".long 0x01b0000b", options(nostack));
    }
}

/// [`DataCache`] backed by the C906 extension instructions.
#[derive(Debug, Default, Clone, Copy)]
pub struct C906Cache;

impl DataCache for C906Cache {
    fn invalidate_range(&mut self, addr: usize, len: usize) {
        invalidate_range(addr, len);
    }

    fn clean_invalidate_all(&mut self) {
        clean_invalidate_all();
    }
}

//! Identity-mapped PSRAM as the staging target.

use arch_riscv64::C906Cache;
use bootcore::{DataCache, PhysMemory};

pub struct Psram {
    cache: C906Cache,
}

impl Psram {
    pub const fn new() -> Self {
        Self { cache: C906Cache }
    }
}

impl PhysMemory for Psram {
    unsafe fn region_mut(&mut self, addr: usize, len: usize) -> &mut [u8] {
        // SAFETY: the MMU is off, physical addresses are used directly and
        // the caller guarantees exclusive use of the range.
        unsafe { core::slice::from_raw_parts_mut(addr as *mut u8, len) }
    }

    fn publish(&mut self) {
        self.cache.clean_invalidate_all();
    }
}

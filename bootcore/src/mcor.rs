//! T-Head `mcor` (machine cache operation register) fields.
//!
//! Kept here rather than in the arch crate so the value written at handoff
//! can be checked on the host.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mcor: usize {
        /// Operate on the instruction cache.
        const CACHE_SEL_I = 1 << 0;
        /// Operate on the data cache.
        const CACHE_SEL_D = 1 << 1;
        /// Invalidate the selected caches.
        const INV = 1 << 4;
        /// Write dirty lines of the selected caches back first.
        const CLR = 1 << 5;
        /// Invalidate the branch history table.
        const BHT_INV = 1 << 16;
        /// Invalidate the branch target buffer.
        const BTB_INV = 1 << 17;

        /// Clean and invalidate both caches, drop branch prediction state.
        ///
        /// The loader keeps writing its stack after the images are published,
        /// so a plain invalidate would discard those lines.
        const FLUSH_ALL = Self::CACHE_SEL_I.bits()
            | Self::CACHE_SEL_D.bits()
            | Self::CLR.bits()
            | Self::INV.bits()
            | Self::BHT_INV.bits()
            | Self::BTB_INV.bits();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_all_writes_back_before_invalidating() {
        assert!(Mcor::FLUSH_ALL.contains(Mcor::CLR | Mcor::INV));
        assert!(Mcor::FLUSH_ALL.contains(Mcor::CACHE_SEL_I | Mcor::CACHE_SEL_D));
        assert_eq!(Mcor::FLUSH_ALL.bits(), 0x30033);
    }

    #[test]
    fn test_invalidate_alone_is_not_enough() {
        let invalidate_only = Mcor::FLUSH_ALL.difference(Mcor::CLR);
        assert_eq!(invalidate_only.bits(), 0x30013);
        assert_ne!(invalidate_only, Mcor::FLUSH_ALL);
    }
}

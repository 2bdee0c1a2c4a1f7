//! Physical Memory Protection policy.
//!
//! A [`PmpTable`] is an ordered list of regions, already encoded into the
//! `pmpaddr`/`pmpcfg` values the hardware wants. Building the table is pure
//! so it can be checked on the host; the arch crate only writes it out.

use bitflags::bitflags;

use crate::error::{Error, Result};

/// Entries implemented by the PMP unit of the C906.
pub const PMP_ENTRIES: usize = 8;

/// Upper bound on entries any table can hold.
pub const MAX_PMP_ENTRIES: usize = 16;

/// Entries packed into one `pmpcfg` CSR on RV64.
pub const ENTRIES_PER_CFG: usize = 8;

/// Smallest NAPOT region.
pub const NAPOT_MIN_SIZE: usize = 8;

/// Bits of physical address held by `pmpaddr` (address bits 55:2).
pub const PMPADDR_MASK: usize = (0x003F_FFFF_FFFF_FFFFu64 & usize::MAX as u64) as usize;

bitflags! {
    /// Access permissions of one region.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PmpPermissions: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXEC = 1 << 2;

        const RW = Self::READ.bits() | Self::WRITE.bits();
        const RX = Self::READ.bits() | Self::EXEC.bits();
        const RWX = Self::RW.bits() | Self::EXEC.bits();
    }
}

/// `A` field of a `pmpcfg` octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AddressMatching {
    Off = 0,
    Tor = 1,
    Na4 = 2,
    Napot = 3,
}

const A_SHIFT: u8 = 3;
const LOCK: u8 = 1 << 7;

/// How far a region reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extent {
    /// `size` bytes from the region address.
    Napot { size: usize },
    /// From the previous entry's address up to this one.
    TopOfRange,
}

/// One PMP entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmpRegion {
    pub address: usize,
    pub extent: Extent,
    pub permissions: PmpPermissions,
    pub locked: bool,
}

impl PmpRegion {
    /// Naturally aligned power-of-two region.
    pub fn napot(address: usize, size: usize, permissions: PmpPermissions) -> Result<Self> {
        let encodable = size >= NAPOT_MIN_SIZE
            && size.is_power_of_two()
            && address % size == 0
            && address
                .checked_add(size - 1)
                .is_some_and(|last| last >> 2 <= PMPADDR_MASK);
        if !encodable {
            return Err(Error::InvalidPmpRegion { address, size });
        }
        Ok(Self {
            address,
            extent: Extent::Napot { size },
            permissions,
            locked: false,
        })
    }

    /// Everything from the previous entry's top up to `top`.
    ///
    /// `top` is clamped to what `pmpaddr` can express.
    pub fn top_of_range(top: usize, permissions: PmpPermissions) -> Self {
        Self {
            address: top,
            extent: Extent::TopOfRange,
            permissions,
            locked: false,
        }
    }

    /// Lock the entry so it also binds M-mode until reset.
    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    pub fn addressing_mode(&self) -> AddressMatching {
        match self.extent {
            Extent::Napot { .. } => AddressMatching::Napot,
            Extent::TopOfRange => AddressMatching::Tor,
        }
    }

    /// Value for this entry's `pmpaddr` CSR.
    pub fn pmpaddr(&self) -> usize {
        match self.extent {
            Extent::Napot { size } => (self.address + ((size - 1) >> 1)) >> 2,
            Extent::TopOfRange => (self.address >> 2).min(PMPADDR_MASK),
        }
    }

    /// This entry's octet of a `pmpcfg` CSR.
    pub fn pmpcfg(&self) -> u8 {
        let lock = if self.locked { LOCK } else { 0 };
        self.permissions.bits() | (self.addressing_mode() as u8) << A_SHIFT | lock
    }
}

/// Ordered PMP policy, ready to install.
///
/// Only [`PmpTableBuilder::finish`] produces one, so the top-of-range
/// terminator is always the last entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmpTable {
    regions: [Option<PmpRegion>; MAX_PMP_ENTRIES],
    len: usize,
}

impl PmpTable {
    /// Start a table for a PMP unit with `capacity` entries.
    pub const fn builder(capacity: usize) -> PmpTableBuilder {
        PmpTableBuilder::new(capacity)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &PmpRegion> {
        self.regions[..self.len].iter().flatten()
    }

    /// `pmpaddr` values, one per hardware entry. Unused entries are 0.
    pub fn addr_words(&self) -> [usize; MAX_PMP_ENTRIES] {
        let mut words = [0; MAX_PMP_ENTRIES];
        for (word, region) in words.iter_mut().zip(self.iter()) {
            *word = region.pmpaddr();
        }
        words
    }

    /// `pmpcfg0` and `pmpcfg2` for RV64. Unused entries are OFF.
    pub fn cfg_words(&self) -> [u64; MAX_PMP_ENTRIES / ENTRIES_PER_CFG] {
        let mut words = [0u64; MAX_PMP_ENTRIES / ENTRIES_PER_CFG];
        for (i, region) in self.iter().enumerate() {
            words[i / ENTRIES_PER_CFG] |= (region.pmpcfg() as u64) << ((i % ENTRIES_PER_CFG) * 8);
        }
        words
    }
}

/// Collects regions in priority order.
#[derive(Debug, Clone, Copy)]
pub struct PmpTableBuilder {
    table: PmpTable,
    capacity: usize,
}

impl PmpTableBuilder {
    pub const fn new(capacity: usize) -> Self {
        let capacity = if capacity > MAX_PMP_ENTRIES {
            MAX_PMP_ENTRIES
        } else {
            capacity
        };
        Self {
            table: PmpTable {
                regions: [None; MAX_PMP_ENTRIES],
                len: 0,
            },
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a region. Earlier entries win on overlap.
    pub fn region(mut self, region: PmpRegion) -> Result<Self> {
        if self.table.len == self.capacity {
            return Err(Error::PmpTableFull);
        }
        self.table.regions[self.table.len] = Some(region);
        self.table.len += 1;
        Ok(self)
    }

    /// Close the table with a no-access top-of-range entry reaching the end
    /// of the address space.
    ///
    /// A TOR entry starts at the previous entry's `pmpaddr`, so it cannot
    /// match everything the regions leave out. Gaps below it are matched by
    /// nothing, which denies S/U-mode access just like the terminator does:
    /// every address outside the regions ends up with no permissions.
    pub fn finish(self) -> Result<PmpTable> {
        Ok(self
            .region(PmpRegion::top_of_range(usize::MAX, PmpPermissions::empty()))?
            .table)
    }
}

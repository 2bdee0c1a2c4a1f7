//! Execute-in-place flash window.
//!
//! The flash controller maps part of the flash device into the CPU address
//! space. Board bring-up has already configured the mapping; this module
//! only translates absolute flash offsets into that window and keeps the
//! data cache honest about it.

use crate::error::{Error, Result};
use crate::traits::{DataCache, FlashRead};

/// Read-only view of the XIP flash mapping.
pub struct XipWindow<C> {
    /// CPU address of the first mapped byte.
    base: usize,
    /// Flash offset that appears at `base`.
    origin: u32,
    /// Number of mapped bytes.
    len: usize,
    cache: C,
}

impl<C: DataCache> XipWindow<C> {
    /// Create a window where flash offset `origin` is visible at CPU address
    /// `base` and the following `len` bytes are mapped.
    ///
    /// # Safety
    /// `base .. base + len` must stay readable for the lifetime of the
    /// window and must not be written through any other alias.
    pub const unsafe fn new(base: usize, origin: u32, len: usize, cache: C) -> Self {
        Self {
            base,
            origin,
            len,
            cache,
        }
    }

    /// CPU address of `offset .. offset + len`, if the window covers it.
    pub fn address_of(&self, offset: u32, len: usize) -> Option<usize> {
        let start = offset.checked_sub(self.origin)? as usize;
        let end = start.checked_add(len)?;
        (end <= self.len).then(|| self.base + start)
    }
}

impl<C: DataCache> FlashRead for XipWindow<C> {
    fn read(&mut self, offset: u32, len: usize) -> Result<&[u8]> {
        let addr = self
            .address_of(offset, len)
            .ok_or(Error::FlashRange { offset, length: len })?;

        self.cache.invalidate_range(addr, len);

        // SAFETY: `address_of` bounded the range to the mapping promised
        // readable in `new`.
        Ok(unsafe { core::slice::from_raw_parts(addr as *const u8, len) })
    }
}

//! PMP CSR installation.
//!
//! The encoding lives in [`bootcore::pmp`]; this only moves the words into
//! the CSRs. Address registers go first and the configuration words last,
//! so no entry becomes active with a stale address.

use bootcore::PmpTable;
use bootcore::pmp::{ENTRIES_PER_CFG, MAX_PMP_ENTRIES};

macro_rules! write_pmpaddr {
    ($index:expr, $value:expr, [$($n:literal),*]) => {
        match $index {
            $($n => unsafe {
                core::arch::asm!(concat!("csrw pmpaddr", $n, ", {}"), in(reg) $value, options(nostack));
            },)*
            _ => {}
        }
    };
}

/// Write `table` into the first `entries` PMP slots of this hart.
///
/// Slots the table does not use are written as OFF.
pub fn install(table: &PmpTable, entries: usize) {
    let entries = entries.min(MAX_PMP_ENTRIES);
    let addrs = table.addr_words();
    let cfgs = table.cfg_words();

    for (i, &addr) in addrs.iter().enumerate().take(entries) {
        write_pmpaddr!(i, addr, [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]);
    }

    unsafe {
        core::arch::asm!("csrw pmpcfg0, {}", in(reg) cfgs[0] as usize, options(nostack));
        if entries > ENTRIES_PER_CFG {
            core::arch::asm!("csrw pmpcfg2, {}", in(reg) cfgs[1] as usize, options(nostack));
        }
        // Later accesses must be checked against the new policy.
        core::arch::asm!("sfence.vma", options(nostack));
    }
    crate::fence();
}

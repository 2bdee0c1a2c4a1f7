//! T-Head machine-mode extension CSRs.
//!
//! Field layouts live in [`bootcore::mcor`].

/// Machine hardware configuration.
pub const MHCR: u16 = 0x7C1;
/// Machine cache operation register.
pub const MCOR: u16 = 0x7C2;

#[inline]
pub fn write_mcor(value: usize) {
    unsafe {
        core::arch::asm!("csrw {csr}, {value}", csr = const MCOR, value = in(reg) value, options(nostack));
    }
}

#[inline]
pub fn read_mhcr() -> usize {
    let value: usize;
    unsafe {
        core::arch::asm!("csrr {value}, {csr}", csr = const MHCR, value = out(reg) value, options(nomem, nostack));
    }
    value
}

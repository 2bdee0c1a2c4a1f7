//! Final jump into the next boot stage.

/// Transfer control to `entry` following the RISC-V firmware contract:
/// `a0` holds the hart id and `a1` the device tree address.
///
/// # Safety
/// `entry` must be executable code that accepts that contract. The
/// instruction cache must already be coherent with the staged images.
pub unsafe fn jump(entry: usize, hart_id: usize, dtb: usize) -> ! {
    unsafe {
        core::arch::asm!(
            "jr {entry}",
            entry = in(reg) entry,
            in("a0") hart_id,
            in("a1") dtb,
            options(noreturn),
        );
    }
}

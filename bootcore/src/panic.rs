//! Panic handling utilities.
//!
//! Each platform binary defines its own `#[panic_handler]` and uses these
//! shared pieces so a panic looks like any other fatal boot error.

use log::error;

/// Log a panic through the installed logger.
pub fn report(info: &core::panic::PanicInfo<'_>) {
    match info.location() {
        Some(loc) => error!("panic at {}:{}: {}", loc.file(), loc.line(), info.message()),
        None => error!("panic: {}", info.message()),
    }
}

/// Infinite loop for panic situations.
#[inline(always)]
pub fn halt_loop() -> ! {
    loop {
        #[cfg(target_arch = "riscv64")]
        unsafe {
            core::arch::asm!("wfi", options(nomem, nostack));
        }

        #[cfg(not(target_arch = "riscv64"))]
        core::hint::spin_loop();
    }
}

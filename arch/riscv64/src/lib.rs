//! RISC-V architecture support.
//!
//! Provides the entry point, the C906 cache and core-configuration
//! extensions, PMP installation and the final jump for the BL808 D0 core.
//! Everything is empty when built for any other architecture so the host
//! workspace still resolves.

#![cfg(target_arch = "riscv64")]
#![no_std]

pub mod cache;
pub mod cpu;
pub mod csr;
pub mod handoff;
pub mod pmp;

pub use cache::C906Cache;
pub use cpu::C906;

#[cfg(feature = "default-entry")]
use core::arch::global_asm;

// Entry point assembly.
// The primary bootloader jumps here in M-mode with the MMU off.
// Only the boot hart continues; it sets up its stack, BSS and data
// before calling into Rust. Only included when "default-entry" feature is enabled.
#[cfg(feature = "default-entry")]
global_asm!(
    r#"
.section .text._start
.global _start

_start:
    // No interrupts until the next stage sets them up
    csrw    mie, zero
    csrw    mip, zero

    // Park all harts except hart 0
    csrr    t0, mhartid
    bnez    t0, .Lpark

    // Set up stack pointer
    la      sp, _stack_top

    // Clear BSS
    la      t0, __bss_start
    la      t1, __bss_end
.Lclear_bss:
    bgeu    t0, t1, .Lbss_done
    sd      zero, 0(t0)
    addi    t0, t0, 8
    j       .Lclear_bss
.Lbss_done:

    // Copy .data from its load address
    la      t0, __data_start
    la      t1, __data_end
    la      t2, __data_load
.Lcopy_data:
    bgeu    t0, t1, .Ldata_done
    ld      t3, 0(t2)
    sd      t3, 0(t0)
    addi    t0, t0, 8
    addi    t2, t2, 8
    j       .Lcopy_data
.Ldata_done:

    // Call Rust entry point
    call    boot_main

    // If boot_main returns, halt
.Lpark:
    wfi
    j       .Lpark
"#
);

/// Identifier of the current hart.
#[inline]
pub fn hart_id() -> usize {
    let id: usize;
    unsafe {
        core::arch::asm!("csrr {}, mhartid", out(reg) id, options(nomem, nostack));
    }
    id
}

/// Order all previous memory accesses before later ones.
#[inline]
pub fn fence() {
    unsafe {
        core::arch::asm!("fence rw, rw", options(nostack));
    }
}

/// Synchronize instruction fetch with prior stores.
#[inline]
pub fn fence_i() {
    unsafe {
        core::arch::asm!("fence.i", options(nostack));
    }
}

/// Wait for interrupt (low power idle).
#[inline]
pub fn wfi() {
    unsafe {
        core::arch::asm!("wfi", options(nomem, nostack));
    }
}

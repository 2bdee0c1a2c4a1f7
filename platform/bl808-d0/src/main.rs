//! D0 secondary program loader for the BL808.
//!
//! Runs in place from flash on the C906 right after the primary
//! bootloader. It stages the firmware, device tree and kernel (plus the
//! root filesystem on the Ox64) into PSRAM, sets up PMP and jumps into the
//! firmware with `a0 = hart id` and `a1 = device tree`.
//!
//! # Module Organization
//!
//! - `memory_map` - addresses, variant selection, PMP layout
//! - `uart` - console output
//! - `ram` - PSRAM staging target
//! - `heap` - allocator required by `lz4_flex`
//! - `mmio` - register access

#![no_std]
#![no_main]

mod heap;
mod memory_map;
mod mmio;
mod ram;
mod uart;

use arch_riscv64::{C906, C906Cache};
use bootcore::logger::ConsoleLogger;
use bootcore::lz4::Lz4Legacy;
use bootcore::pmp::PMP_ENTRIES;
use bootcore::{Stager, XipWindow, layout, sequence};
use log::{LevelFilter, info};

use crate::ram::Psram;
use crate::uart::Uart;

const LOG_LEVEL: LevelFilter = LevelFilter::Info;

static LOGGER: ConsoleLogger<Uart> = ConsoleLogger::new();

/// Main loader entry point (called from assembly).
#[unsafe(no_mangle)]
pub extern "C" fn boot_main() -> ! {
    // SAFETY: UART3 was configured by the primary bootloader.
    LOGGER.attach(unsafe { Uart::new(memory_map::UART3_BASE) });
    let _ = LOGGER.install(LOG_LEVEL);
    heap::init();

    info!("D0 SPL v{}", env!("CARGO_PKG_VERSION"));
    memory_map::print_memory_map();

    // SAFETY: the flash controller maps the window before this stage runs
    // and nothing writes to it.
    let flash = unsafe {
        XipWindow::new(
            memory_map::XIP_BASE,
            layout::XIP_ORIGIN,
            memory_map::XIP_MAPPED,
            C906Cache,
        )
    };
    let mut stager = Stager::new(flash, Psram::new(), Lz4Legacy::new(), memory_map::OUTPUT_BOUND);
    let mut cpu = C906::new(PMP_ENTRIES);

    sequence::run(
        &mut cpu,
        &mut stager,
        &memory_map::DESCRIPTORS,
        memory_map::pmp_table,
    )
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    bootcore::panic::report(info);
    bootcore::panic::halt_loop()
}

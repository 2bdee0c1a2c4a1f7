//! BL808 D0 memory map.
//!
//! # Physical Memory Layout
//!
//! ```text
//! 0x2000_0000 ┌─────────────────────────────────────────┐
//!             │ Peripherals, D0 SRAM (loader data)      │ 512MB  RW
//! 0x4000_0000 ├─────────────────────────────────────────┤
//!             │ ...                                     │
//! 0x5000_0000 ├─────────────────────────────────────────┤ ← PSRAM
//!             │ Firmware (OpenSBI)               48KB   │
//! 0x5001_0000 │ Device tree                      64KB   │
//! 0x5010_0000 │ Kernel                                  │
//! 0x5200_0000 │ Root filesystem (Ox64)           32MB   │ 64MB   RWX
//! 0x5400_0000 ├─────────────────────────────────────────┤
//!             │ ...                                     │
//! 0x5800_0000 ├─────────────────────────────────────────┤ ← XIP, flash 0x100000
//!             │ This loader                      64KB   │
//!             │ Packed images                           │ 32MB   RX
//! 0x5A00_0000 └─────────────────────────────────────────┘
//! ```

use bootcore::layout;
use bootcore::pmp::PMP_ENTRIES;
use bootcore::{DescriptorTable, OutputBound, PmpPermissions, PmpRegion, PmpTable, Result};
use log::info;

// ============================================================================
// Variant
// ============================================================================

#[cfg(all(feature = "variant-m1s", feature = "variant-ox64"))]
compile_error!("select exactly one of `variant-m1s` and `variant-ox64`");

#[cfg(not(any(feature = "variant-m1s", feature = "variant-ox64")))]
compile_error!("select one of `variant-m1s` and `variant-ox64`");

#[cfg(feature = "variant-m1s")]
pub const VARIANT: &str = "m1s";
#[cfg(feature = "variant-m1s")]
pub const DESCRIPTORS: DescriptorTable = layout::M1S;

#[cfg(feature = "variant-ox64")]
pub const VARIANT: &str = "ox64";
#[cfg(feature = "variant-ox64")]
pub const DESCRIPTORS: DescriptorTable = layout::OX64;

// ============================================================================
// Flash
// ============================================================================

/// SPI NOR size on both boards.
pub const FLASH_SIZE: usize = 16 * 1024 * 1024;

/// CPU address of the D0 XIP window.
pub const XIP_BASE: usize = 0x5800_0000;

/// Flash mapped through the window, starting at `layout::XIP_ORIGIN`.
pub const XIP_MAPPED: usize = FLASH_SIZE - layout::XIP_ORIGIN as usize;

/// Address space reserved for the window.
pub const XIP_WINDOW_SIZE: usize = 32 * 1024 * 1024;

// ============================================================================
// RAM
// ============================================================================

pub const PSRAM_BASE: usize = 0x5000_0000;
pub const PSRAM_SIZE: usize = 64 * 1024 * 1024;
pub const PSRAM_END: usize = PSRAM_BASE + PSRAM_SIZE;

/// Destination bound handed to the stager.
#[cfg(not(feature = "bounded-decompression"))]
pub const OUTPUT_BOUND: OutputBound = OutputBound::RamEnd(PSRAM_END);
#[cfg(feature = "bounded-decompression")]
pub const OUTPUT_BOUND: OutputBound = OutputBound::Descriptor;

// ============================================================================
// Peripherals
// ============================================================================

/// Peripheral window, also covering D0 SRAM.
pub const MMIO_BASE: usize = 0x2000_0000;
pub const MMIO_SIZE: usize = 512 * 1024 * 1024;

/// UART3, the D0 console.
pub const UART3_BASE: usize = 0x3000_2000;

// ============================================================================
// Compile-time checks
// ============================================================================

const _: () = {
    // Every image lands in PSRAM.
    assert!(layout::FIRMWARE_LOAD_ADDR >= PSRAM_BASE);
    assert!(layout::ROOTFS_LOAD_ADDR + layout::ROOTFS_MAX_SIZE <= PSRAM_END);

    // Every image starts inside the window.
    assert!(((layout::ROOTFS_FLASH_OFFSET - layout::XIP_ORIGIN) as usize) < XIP_MAPPED);
    assert!(XIP_MAPPED <= XIP_WINDOW_SIZE);

    assert!(UART3_BASE >= MMIO_BASE && UART3_BASE < MMIO_BASE + MMIO_SIZE);
};

// ============================================================================
// Protection
// ============================================================================

/// PMP policy for the next stage, highest priority first.
pub fn pmp_table() -> Result<PmpTable> {
    PmpTable::builder(PMP_ENTRIES)
        .region(PmpRegion::napot(MMIO_BASE, MMIO_SIZE, PmpPermissions::RW)?)?
        .region(PmpRegion::napot(PSRAM_BASE, PSRAM_SIZE, PmpPermissions::RWX)?)?
        .region(PmpRegion::napot(XIP_BASE, XIP_WINDOW_SIZE, PmpPermissions::RX)?)?
        .finish()
}

// ============================================================================
// Debug
// ============================================================================

/// Log the memory layout and the images of the selected variant.
pub fn print_memory_map() {
    use bootcore::fmt::Size;

    info!("variant {VARIANT}");
    info!("  XIP:   {XIP_BASE:#010x} (flash {:#x}, {})", layout::XIP_ORIGIN, Size(XIP_MAPPED));
    info!("  PSRAM: {PSRAM_BASE:#010x}..{PSRAM_END:#010x} ({})", Size(PSRAM_SIZE));
    for desc in DESCRIPTORS.iter() {
        info!(
            "  {:<8} flash {:#08x} -> {:#010x} (max {})",
            desc.name.as_str(),
            desc.flash_offset,
            desc.ram_destination,
            Size(desc.fixed_size)
        );
    }
}

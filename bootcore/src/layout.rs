//! Flash and RAM placement of the boot images, per board variant.
//!
//! Shared by the loader and the `mkflash` host tool so both agree on where
//! every image lives.

use crate::image::{DescriptorTable, ImageDescriptor, ImageName};

// ============================================================================
// Flash
// ============================================================================

/// First flash offset visible through the D0 XIP window.
pub const XIP_ORIGIN: u32 = 0x0010_0000;

pub const DTB_FLASH_OFFSET: u32 = 0x0011_0000;
pub const FIRMWARE_FLASH_OFFSET: u32 = 0x0012_0000;
pub const KERNEL_FLASH_OFFSET: u32 = 0x0013_0000;
pub const ROOTFS_FLASH_OFFSET: u32 = 0x0052_0000;

// ============================================================================
// RAM (PSRAM)
// ============================================================================

pub const FIRMWARE_LOAD_ADDR: usize = 0x5000_0000;
pub const DTB_LOAD_ADDR: usize = 0x5001_0000;
pub const KERNEL_LOAD_ADDR: usize = 0x5010_0000;
pub const ROOTFS_LOAD_ADDR: usize = 0x5200_0000;

pub const DTB_SIZE: usize = 0x1_0000;
pub const FIRMWARE_SIZE: usize = 0xC000;
/// Room between the kernel load address and the root filesystem.
pub const KERNEL_MAX_SIZE: usize = ROOTFS_LOAD_ADDR - KERNEL_LOAD_ADDR;
pub const ROOTFS_MAX_SIZE: usize = 0x0200_0000;

// ============================================================================
// Descriptors
// ============================================================================

pub const KERNEL: ImageDescriptor = ImageDescriptor {
    name: ImageName::Kernel,
    flash_offset: KERNEL_FLASH_OFFSET,
    ram_destination: KERNEL_LOAD_ADDR,
    fixed_size: KERNEL_MAX_SIZE,
    required: true,
};

pub const DEVICE_TREE: ImageDescriptor = ImageDescriptor {
    name: ImageName::DeviceTree,
    flash_offset: DTB_FLASH_OFFSET,
    ram_destination: DTB_LOAD_ADDR,
    fixed_size: DTB_SIZE,
    required: true,
};

pub const FIRMWARE: ImageDescriptor = ImageDescriptor {
    name: ImageName::Firmware,
    flash_offset: FIRMWARE_FLASH_OFFSET,
    ram_destination: FIRMWARE_LOAD_ADDR,
    fixed_size: FIRMWARE_SIZE,
    required: true,
};

pub const ROOT_FILESYSTEM: ImageDescriptor = ImageDescriptor {
    name: ImageName::RootFilesystem,
    flash_offset: ROOTFS_FLASH_OFFSET,
    ram_destination: ROOTFS_LOAD_ADDR,
    fixed_size: ROOTFS_MAX_SIZE,
    required: false,
};

/// Sipeed M1s: kernel, device tree and firmware.
pub const M1S: DescriptorTable = DescriptorTable {
    kernel: KERNEL,
    device_tree: DEVICE_TREE,
    firmware: FIRMWARE,
    root_filesystem: None,
};

/// Pine64 Ox64: adds a compressed root filesystem.
pub const OX64: DescriptorTable = DescriptorTable {
    root_filesystem: Some(ROOT_FILESYSTEM),
    ..M1S
};

// ============================================================================
// Compile-time checks
// ============================================================================

const _: () = {
    // Headers sit in front of their payload, inside the window.
    assert!(KERNEL.header_offset() >= FIRMWARE_FLASH_OFFSET + FIRMWARE_SIZE as u32);
    assert!(ROOT_FILESYSTEM.header_offset() > KERNEL_FLASH_OFFSET);
    assert!(DTB_FLASH_OFFSET >= XIP_ORIGIN);

    // Flash regions do not overlap.
    assert!(DTB_FLASH_OFFSET + DTB_SIZE as u32 <= FIRMWARE_FLASH_OFFSET);

    // RAM destinations do not overlap.
    assert!(FIRMWARE_LOAD_ADDR + FIRMWARE_SIZE <= DTB_LOAD_ADDR);
    assert!(DTB_LOAD_ADDR + DTB_SIZE <= KERNEL_LOAD_ADDR);
    assert!(KERNEL_LOAD_ADDR + KERNEL_MAX_SIZE <= ROOTFS_LOAD_ADDR);
};

//! Flash image format and the image descriptor table.
//!
//! # Flash layout
//!
//! ```text
//!              ┌──────────────┐
//!   off - 5 →  │ flag (u8)    │  Kernel only; 0 = raw, non-zero = LZ4
//!   off - 4 →  │ length (u32) │  little-endian; FF FF FF FF = no image
//!   off     →  │ payload ...  │
//!              └──────────────┘
//! ```
//!
//! The root filesystem carries only the 4-byte length and is always
//! compressed. Device tree and firmware are fixed-size blobs with no header.

use core::fmt;

use crate::error::{Error, Result};

/// Length field value of erased flash.
pub const ERASED_LENGTH: u32 = 0xFFFF_FFFF;

/// Size of the length field.
pub const LENGTH_FIELD_SIZE: usize = 4;

/// Size of the compression flag.
pub const FLAG_FIELD_SIZE: usize = 1;

/// Logical images handled by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageName {
    Kernel,
    DeviceTree,
    Firmware,
    RootFilesystem,
}

impl ImageName {
    /// Header stored in front of the payload.
    pub const fn header_layout(self) -> HeaderLayout {
        match self {
            ImageName::Kernel => HeaderLayout::FlagAndLength,
            ImageName::RootFilesystem => HeaderLayout::LengthOnly,
            ImageName::DeviceTree | ImageName::Firmware => HeaderLayout::None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ImageName::Kernel => "kernel",
            ImageName::DeviceTree => "dtb",
            ImageName::Firmware => "firmware",
            ImageName::RootFilesystem => "rootfs",
        }
    }
}

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Out-of-band header variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLayout {
    /// Fixed-size blob, length comes from the descriptor.
    None,
    /// One flag byte followed by a 4-byte length.
    FlagAndLength,
    /// A 4-byte length; payload is always compressed.
    LengthOnly,
}

impl HeaderLayout {
    /// Bytes occupied in front of the payload.
    pub const fn size(self) -> usize {
        match self {
            HeaderLayout::None => 0,
            HeaderLayout::FlagAndLength => FLAG_FIELD_SIZE + LENGTH_FIELD_SIZE,
            HeaderLayout::LengthOnly => LENGTH_FIELD_SIZE,
        }
    }
}

/// How the payload is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Raw,
    Lz4,
}

/// Decoded self-describing header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub compression: Compression,
    pub payload_length: u32,
}

impl ImageHeader {
    /// Decode the header bytes stored in front of `image`'s payload.
    ///
    /// `bytes` must be exactly `image.header_layout().size()` long; any
    /// other length, or an image without a header, is an error.
    pub fn parse(image: ImageName, bytes: &[u8]) -> Result<Self> {
        let layout = image.header_layout();
        if layout == HeaderLayout::None {
            return Err(Error::NoHeader(image));
        }
        let malformed = Error::HeaderLength {
            image,
            expected: layout.size(),
            actual: bytes.len(),
        };
        if bytes.len() != layout.size() {
            return Err(malformed);
        }

        let (compression, length) = match bytes.split_first() {
            Some((&flag, length)) if layout == HeaderLayout::FlagAndLength => {
                let compression = if flag != 0 {
                    Compression::Lz4
                } else {
                    Compression::Raw
                };
                (compression, length)
            }
            _ => (Compression::Lz4, bytes),
        };
        let field: [u8; LENGTH_FIELD_SIZE] = length.try_into().map_err(|_| malformed)?;

        let payload_length = decode_length(field).ok_or(Error::ImageNotFound(image))?;
        Ok(Self {
            compression,
            payload_length,
        })
    }
}

/// Decode a little-endian length field. `None` means erased flash.
#[inline]
pub const fn decode_length(bytes: [u8; LENGTH_FIELD_SIZE]) -> Option<u32> {
    match u32::from_le_bytes(bytes) {
        ERASED_LENGTH => None,
        len => Some(len),
    }
}

/// Where one image lives in flash and where it goes in RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDescriptor {
    pub name: ImageName,
    /// Absolute offset of the payload within the flash device.
    pub flash_offset: u32,
    /// Physical load address.
    pub ram_destination: usize,
    /// Copy length for headerless images, upper bound for the others.
    pub fixed_size: usize,
    /// Missing mandatory images abort the boot; optional ones are skipped.
    pub required: bool,
}

impl ImageDescriptor {
    /// Flash offset of the out-of-band header.
    pub const fn header_offset(&self) -> u32 {
        self.flash_offset - self.name.header_layout().size() as u32
    }
}

/// Per-variant set of images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorTable {
    pub kernel: ImageDescriptor,
    pub device_tree: ImageDescriptor,
    pub firmware: ImageDescriptor,
    pub root_filesystem: Option<ImageDescriptor>,
}

impl DescriptorTable {
    /// Descriptors in staging order.
    pub fn iter(&self) -> impl Iterator<Item = &ImageDescriptor> {
        [&self.kernel, &self.device_tree, &self.firmware]
            .into_iter()
            .chain(self.root_filesystem.as_ref())
    }
}

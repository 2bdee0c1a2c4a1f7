//! Flash region image builder.
//!
//! The image starts at flash offset [`XIP_ORIGIN`] and covers everything
//! the D0 loader reads: the loader itself, then every image at the offset
//! its descriptor names. Unused bytes stay `0xFF` like erased flash, so a
//! missing optional image reads back as the "not found" sentinel.
//!
//! ```text
//! 0x100000  loader (optional)
//! 0x110000  device tree      raw, padded to its fixed size
//! 0x120000  firmware         raw, padded to its fixed size
//! 0x12FFFB  flag, length     kernel header
//! 0x130000  kernel           raw or LZ4 legacy
//! 0x51FFFC  length           root filesystem header (Ox64)
//! 0x520000  root filesystem  always LZ4 legacy
//! ```

use anyhow::{Context, Result, bail, ensure};
use bootcore::image::{ERASED_LENGTH, HeaderLayout};
use bootcore::layout::XIP_ORIGIN;
use bootcore::lz4::{LEGACY_CHUNK_SIZE, LEGACY_MAGIC};
use bootcore::{DescriptorTable, ImageDescriptor, ImageName};
use log::{debug, info};

/// Erased flash.
pub const ERASED: u8 = 0xFF;

/// Payloads to pack.
#[derive(Debug, Default)]
pub struct Images {
    pub spl: Option<Vec<u8>>,
    pub device_tree: Vec<u8>,
    pub firmware: Vec<u8>,
    pub kernel: Vec<u8>,
    pub root_filesystem: Option<Vec<u8>>,
}

/// Encode `data` as an LZ4 legacy stream.
pub fn compress_legacy(data: &[u8]) -> Vec<u8> {
    let mut out = LEGACY_MAGIC.to_le_bytes().to_vec();
    for chunk in data.chunks(LEGACY_CHUNK_SIZE) {
        let block = lz4_flex::block::compress(chunk);
        out.extend_from_slice(&(block.len() as u32).to_le_bytes());
        out.extend_from_slice(&block);
    }
    out
}

/// One range of the image that has been claimed.
struct Placement {
    what: &'static str,
    start: usize,
    end: usize,
}

/// Flash image under construction.
struct FlashImage {
    bytes: Vec<u8>,
    placed: Vec<Placement>,
}

impl FlashImage {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            placed: Vec::new(),
        }
    }

    /// Write `data` at absolute flash offset `offset`, claiming `reserve`
    /// bytes (at least `data.len()`).
    fn place(&mut self, what: &'static str, offset: u32, data: &[u8], reserve: usize) -> Result<()> {
        let start = offset
            .checked_sub(XIP_ORIGIN)
            .with_context(|| format!("{what} at {offset:#x} is below the XIP window"))?
            as usize;
        let end = start + reserve.max(data.len());

        if let Some(other) = self.placed.iter().find(|p| start < p.end && p.start < end) {
            bail!(
                "{what} ({:#x}..{:#x}) overlaps {} ({:#x}..{:#x})",
                start + XIP_ORIGIN as usize,
                end + XIP_ORIGIN as usize,
                other.what,
                other.start + XIP_ORIGIN as usize,
                other.end + XIP_ORIGIN as usize
            );
        }

        if self.bytes.len() < end {
            self.bytes.resize(end, ERASED);
        }
        self.bytes[start..start + data.len()].copy_from_slice(data);
        self.placed.push(Placement { what, start, end });
        debug!("{what}: {:#x} bytes at {offset:#x}", data.len());
        Ok(())
    }
}

fn header_bytes(desc: &ImageDescriptor, compressed: bool, len: usize) -> Result<Vec<u8>> {
    let len = u32::try_from(len)
        .ok()
        .filter(|&l| l != ERASED_LENGTH)
        .with_context(|| format!("{} payload of {len:#x} bytes cannot be described", desc.name))?;

    let mut header = Vec::with_capacity(desc.name.header_layout().size());
    if desc.name.header_layout() == HeaderLayout::FlagAndLength {
        header.push(compressed as u8);
    }
    header.extend_from_slice(&len.to_le_bytes());
    Ok(header)
}

fn place_fixed(image: &mut FlashImage, desc: &ImageDescriptor, data: &[u8]) -> Result<()> {
    ensure!(
        data.len() <= desc.fixed_size,
        "{} is {:#x} bytes, only {:#x} fit",
        desc.name,
        data.len(),
        desc.fixed_size
    );
    image.place(desc.name.as_str(), desc.flash_offset, data, desc.fixed_size)
}

fn place_described(
    image: &mut FlashImage,
    desc: &ImageDescriptor,
    data: &[u8],
    compress: bool,
) -> Result<()> {
    let compress = compress || desc.name.header_layout() == HeaderLayout::LengthOnly;
    let payload = if compress {
        compress_legacy(data)
    } else {
        data.to_vec()
    };
    ensure!(
        data.len() <= desc.fixed_size,
        "{} unpacks to {:#x} bytes, only {:#x} fit at {:#x}",
        desc.name,
        data.len(),
        desc.fixed_size,
        desc.ram_destination
    );

    let header = header_bytes(desc, compress, payload.len())?;
    let header_name = match desc.name {
        ImageName::Kernel => "kernel header",
        _ => "rootfs header",
    };
    image.place(header_name, desc.header_offset(), &header, header.len())?;
    image.place(desc.name.as_str(), desc.flash_offset, &payload, payload.len())?;

    info!(
        "{}: {:#x} bytes{}",
        desc.name,
        payload.len(),
        if compress {
            format!(" (LZ4, from {:#x})", data.len())
        } else {
            String::new()
        }
    );
    Ok(())
}

/// Lay out `images` according to `table`.
///
/// Returns the bytes to program at [`XIP_ORIGIN`].
pub fn pack(table: &DescriptorTable, images: &Images, compress_kernel: bool) -> Result<Vec<u8>> {
    let mut image = FlashImage::new();

    if let Some(spl) = &images.spl {
        let room = (table.device_tree.flash_offset - XIP_ORIGIN) as usize;
        ensure!(spl.len() <= room, "loader is {:#x} bytes, only {room:#x} fit", spl.len());
        image.place("spl", XIP_ORIGIN, spl, room)?;
    }

    place_fixed(&mut image, &table.device_tree, &images.device_tree)?;
    place_fixed(&mut image, &table.firmware, &images.firmware)?;
    place_described(&mut image, &table.kernel, &images.kernel, compress_kernel)?;

    match (&table.root_filesystem, &images.root_filesystem) {
        (Some(desc), Some(data)) => place_described(&mut image, desc, data, true)?,
        (Some(desc), None) if desc.required => bail!("{} is required for this variant", desc.name),
        (Some(desc), None) => info!("{}: none, header left erased", desc.name),
        (None, Some(_)) => bail!("this variant has no root filesystem"),
        (None, None) => {}
    }

    Ok(image.bytes)
}

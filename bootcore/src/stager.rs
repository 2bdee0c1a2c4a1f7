//! Image stager: materializes each descriptor's image in RAM.
//!
//! Headerless images (device tree, firmware) are copied with the length the
//! descriptor fixes. Self-describing images (kernel, root filesystem) have
//! their header read first, then exactly the payload range is re-windowed
//! and either copied or handed to the decompressor.

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::image::{Compression, DescriptorTable, HeaderLayout, ImageDescriptor, ImageHeader, ImageName};
use crate::traits::{Decompressor, FlashRead, PhysMemory};

/// How much RAM a destination may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputBound {
    /// Everything from the destination up to this physical address. The
    /// decompressor is trusted to stop on its own.
    RamEnd(usize),
    /// At most the descriptor's `fixed_size`.
    Descriptor,
}

impl OutputBound {
    fn capacity(self, desc: &ImageDescriptor) -> usize {
        match self {
            OutputBound::RamEnd(end) => end.saturating_sub(desc.ram_destination),
            OutputBound::Descriptor => desc.fixed_size,
        }
    }
}

/// What one staging step produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagedImage {
    pub name: ImageName,
    pub destination: usize,
    /// Bytes read from flash.
    pub stored_len: usize,
    /// Bytes written to RAM.
    pub loaded_len: usize,
    pub compression: Compression,
}

/// Every image of a table, staged.
///
/// Only [`Stager::stage_all`] creates this, and a handoff cannot be planned
/// without it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootImages {
    pub kernel: StagedImage,
    pub device_tree: StagedImage,
    pub firmware: StagedImage,
    pub root_filesystem: Option<StagedImage>,
}

/// Moves images from flash to RAM.
pub struct Stager<F, M, D> {
    flash: F,
    memory: M,
    decompressor: D,
    bound: OutputBound,
}

impl<F, M, D> Stager<F, M, D>
where
    F: FlashRead,
    M: PhysMemory,
    D: Decompressor,
{
    pub fn new(flash: F, memory: M, decompressor: D, bound: OutputBound) -> Self {
        Self {
            flash,
            memory,
            decompressor,
            bound,
        }
    }

    /// Give the collaborators back.
    pub fn into_parts(self) -> (F, M, D) {
        (self.flash, self.memory, self.decompressor)
    }

    /// Stage one image.
    pub fn stage(&mut self, desc: &ImageDescriptor) -> Result<StagedImage> {
        let staged = match desc.name.header_layout() {
            HeaderLayout::None => self.copy(desc, desc.fixed_size, desc.fixed_size)?,
            layout => {
                let header = self.read_header(desc, layout)?;
                let len = header.payload_length as usize;
                match header.compression {
                    Compression::Raw => self.copy(desc, len, self.bound.capacity(desc))?,
                    Compression::Lz4 => self.decompress(desc, len)?,
                }
            }
        };

        info!(
            "{}: {:#x} bytes -> {:#010x} ({:?}, {:#x} stored)",
            staged.name, staged.loaded_len, staged.destination, staged.compression, staged.stored_len
        );
        Ok(staged)
    }

    /// Stage every image of `table` in order and publish the result.
    ///
    /// The first failure of a required image aborts; optional images whose
    /// header is erased are skipped.
    pub fn stage_all(&mut self, table: &DescriptorTable) -> Result<BootImages> {
        let kernel = self.stage(&table.kernel)?;
        let device_tree = self.stage(&table.device_tree)?;
        let firmware = self.stage(&table.firmware)?;

        let root_filesystem = match table.root_filesystem {
            Some(ref desc) => match self.stage(desc) {
                Ok(staged) => Some(staged),
                Err(Error::ImageNotFound(name)) if !desc.required => {
                    warn!("{name}: not present, skipping");
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        self.memory.publish();

        Ok(BootImages {
            kernel,
            device_tree,
            firmware,
            root_filesystem,
        })
    }

    fn read_header(&mut self, desc: &ImageDescriptor, layout: HeaderLayout) -> Result<ImageHeader> {
        let bytes = self.flash.read(desc.header_offset(), layout.size())?;
        debug!("{}: header {:02x?} at {:#x}", desc.name, bytes, desc.header_offset());
        ImageHeader::parse(desc.name, bytes)
    }

    fn copy(&mut self, desc: &ImageDescriptor, len: usize, capacity: usize) -> Result<StagedImage> {
        if len > capacity {
            return Err(Error::ImageTooLarge {
                image: desc.name,
                length: len,
                capacity,
            });
        }

        let src = self.flash.read(desc.flash_offset, len)?;
        // SAFETY: destinations come from the descriptor table, which only
        // names RAM reserved for staged images.
        let dst = unsafe { self.memory.region_mut(desc.ram_destination, len) };
        dst.copy_from_slice(src);

        Ok(StagedImage {
            name: desc.name,
            destination: desc.ram_destination,
            stored_len: len,
            loaded_len: len,
            compression: Compression::Raw,
        })
    }

    fn decompress(&mut self, desc: &ImageDescriptor, len: usize) -> Result<StagedImage> {
        let capacity = self.bound.capacity(desc);
        debug!("{}: decompressing {:#x} bytes into {:#x} available", desc.name, len, capacity);

        let src = self.flash.read(desc.flash_offset, len)?;
        // SAFETY: as in `copy`; the capacity comes from the configured bound.
        let dst = unsafe { self.memory.region_mut(desc.ram_destination, capacity) };
        let produced = self
            .decompressor
            .decompress(src, dst)
            .map_err(|cause| Error::Decompression {
                image: desc.name,
                cause,
            })?;

        Ok(StagedImage {
            name: desc.name,
            destination: desc.ram_destination,
            stored_len: len,
            loaded_len: produced,
            compression: Compression::Lz4,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::XipWindow;
    use crate::testing::{Event, MarkerDecompressor, RecordingCache, SimRam, Trace};

    const ORIGIN: u32 = 0x10_0000;
    const RAM_BASE: usize = 0x5000_0000;
    const RAM_LEN: usize = 0x4000;

    const KERNEL: ImageDescriptor = ImageDescriptor {
        name: ImageName::Kernel,
        flash_offset: ORIGIN + 0x100,
        ram_destination: RAM_BASE + 0x1000,
        fixed_size: 0x800,
        required: true,
    };
    const DTB: ImageDescriptor = ImageDescriptor {
        name: ImageName::DeviceTree,
        flash_offset: ORIGIN + 0x1000,
        ram_destination: RAM_BASE + 0x2000,
        fixed_size: 0x40,
        required: true,
    };
    const FIRMWARE: ImageDescriptor = ImageDescriptor {
        name: ImageName::Firmware,
        flash_offset: ORIGIN + 0x1100,
        ram_destination: RAM_BASE,
        fixed_size: 0x80,
        required: true,
    };
    const ROOTFS: ImageDescriptor = ImageDescriptor {
        name: ImageName::RootFilesystem,
        flash_offset: ORIGIN + 0x1400,
        ram_destination: RAM_BASE + 0x3000,
        fixed_size: 0x1000,
        required: false,
    };

    /// Erased flash with a patterned payload behind every image.
    struct Fixture {
        flash: Vec<u8>,
        trace: Trace,
    }

    impl Fixture {
        fn new() -> Self {
            let mut flash = vec![0xFF; 0x2000];
            for desc in [KERNEL, DTB, FIRMWARE, ROOTFS] {
                let at = (desc.flash_offset - ORIGIN) as usize;
                for (i, b) in flash[at..at + 0x100].iter_mut().enumerate() {
                    *b = (i as u8).wrapping_add(desc.flash_offset as u8);
                }
            }
            Self {
                flash,
                trace: Trace::default(),
            }
        }

        fn kernel_header(&mut self, bytes: [u8; 5]) -> &mut Self {
            let at = (KERNEL.header_offset() - ORIGIN) as usize;
            self.flash[at..at + 5].copy_from_slice(&bytes);
            self
        }

        fn rootfs_header(&mut self, bytes: [u8; 4]) -> &mut Self {
            let at = (ROOTFS.header_offset() - ORIGIN) as usize;
            self.flash[at..at + 4].copy_from_slice(&bytes);
            self
        }

        fn payload(&self, desc: &ImageDescriptor, len: usize) -> &[u8] {
            let at = (desc.flash_offset - ORIGIN) as usize;
            &self.flash[at..at + len]
        }

        fn stager(
            &self,
            bound: OutputBound,
        ) -> Stager<XipWindow<RecordingCache>, SimRam, MarkerDecompressor> {
            let xip = unsafe {
                XipWindow::new(
                    self.flash.as_ptr() as usize,
                    ORIGIN,
                    self.flash.len(),
                    RecordingCache::new(&self.trace),
                )
            };
            Stager::new(
                xip,
                SimRam::new(RAM_BASE, RAM_LEN, &self.trace),
                MarkerDecompressor::new(0xA5, 0x180, &self.trace),
                bound,
            )
        }
    }

    fn table(rootfs: Option<ImageDescriptor>) -> DescriptorTable {
        DescriptorTable {
            kernel: KERNEL,
            device_tree: DTB,
            firmware: FIRMWARE,
            root_filesystem: rootfs,
        }
    }

    const RAM_END: OutputBound = OutputBound::RamEnd(RAM_BASE + RAM_LEN);

    #[test]
    fn test_raw_kernel_is_copied() {
        let mut fx = Fixture::new();
        fx.kernel_header([0x00, 0x64, 0x00, 0x00, 0x00]);
        let mut stager = fx.stager(RAM_END);

        let staged = stager.stage(&KERNEL).unwrap();
        assert_eq!(staged.loaded_len, 100);
        assert_eq!(staged.compression, Compression::Raw);

        let (_, ram, _) = stager.into_parts();
        assert_eq!(ram.at(KERNEL.ram_destination, 100), fx.payload(&KERNEL, 100));
        // Nothing past the payload was written.
        assert!(ram.at(KERNEL.ram_destination + 100, 0x100).iter().all(|&b| b == 0));
        assert!(fx.trace.position(|e| matches!(e, Event::Decompress { .. })).is_none());
    }

    #[test]
    fn test_compressed_kernel_goes_through_decompressor() {
        let mut fx = Fixture::new();
        fx.kernel_header([0x01, 0x64, 0x00, 0x00, 0x00]);
        let mut stager = fx.stager(RAM_END);

        let staged = stager.stage(&KERNEL).unwrap();
        assert_eq!(staged.compression, Compression::Lz4);
        assert_eq!(staged.stored_len, 100);
        assert_eq!(staged.loaded_len, 0x180);

        assert!(fx.trace.events().contains(&Event::Decompress {
            src_len: 100,
            capacity: RAM_BASE + RAM_LEN - KERNEL.ram_destination,
        }));
        let (_, ram, _) = stager.into_parts();
        // Only decompressor output landed, no raw copy of the payload.
        assert!(ram.at(KERNEL.ram_destination, 0x180).iter().all(|&b| b == 0xA5));
    }

    #[test]
    fn test_erased_kernel_is_not_found() {
        let mut fx = Fixture::new();
        fx.kernel_header([0x00, 0xFF, 0xFF, 0xFF, 0xFF]);
        let mut stager = fx.stager(RAM_END);

        assert_eq!(
            stager.stage_all(&table(None)),
            Err(Error::ImageNotFound(ImageName::Kernel))
        );
        let (_, ram, _) = stager.into_parts();
        assert!(ram.bytes.iter().all(|&b| b == 0));
        assert!(!fx.trace.events().contains(&Event::Publish));
    }

    #[test]
    fn test_dtb_copies_fixed_length() {
        let fx = Fixture::new();
        let mut stager = fx.stager(RAM_END);

        let staged = stager.stage(&DTB).unwrap();
        assert_eq!(staged.loaded_len, DTB.fixed_size);

        let (_, ram, _) = stager.into_parts();
        assert_eq!(ram.at(DTB.ram_destination, DTB.fixed_size), fx.payload(&DTB, DTB.fixed_size));
        assert!(ram.at(DTB.ram_destination + DTB.fixed_size, 0x40).iter().all(|&b| b == 0));
        // A single invalidation of the fixed range, no header read.
        assert_eq!(
            fx.trace.events(),
            vec![Event::Invalidate {
                addr: fx.flash.as_ptr() as usize + (DTB.flash_offset - ORIGIN) as usize,
                len: DTB.fixed_size,
            }]
        );
    }

    #[test]
    fn test_raw_copy_is_idempotent() {
        let mut fx = Fixture::new();
        fx.kernel_header([0x00, 0x80, 0x00, 0x00, 0x00]);
        let mut stager = fx.stager(RAM_END);

        stager.stage(&KERNEL).unwrap();
        let (flash, ram, dec) = stager.into_parts();
        let first = ram.bytes.clone();

        let mut stager = Stager::new(flash, ram, dec, RAM_END);
        stager.stage(&KERNEL).unwrap();
        let (_, ram, _) = stager.into_parts();
        assert_eq!(ram.bytes, first);
    }

    #[test]
    fn test_header_and_payload_invalidated_exactly() {
        let mut fx = Fixture::new();
        fx.kernel_header([0x00, 0x20, 0x00, 0x00, 0x00]);
        let base = fx.flash.as_ptr() as usize;
        let mut stager = fx.stager(RAM_END);

        stager.stage(&KERNEL).unwrap();
        assert_eq!(
            fx.trace.events(),
            vec![
                Event::Invalidate {
                    addr: base + (KERNEL.header_offset() - ORIGIN) as usize,
                    len: 5
                },
                Event::Invalidate {
                    addr: base + (KERNEL.flash_offset - ORIGIN) as usize,
                    len: 0x20
                },
            ]
        );
    }

    #[test]
    fn test_optional_rootfs_is_skipped_when_erased() {
        let mut fx = Fixture::new();
        fx.kernel_header([0x00, 0x10, 0x00, 0x00, 0x00]);
        fx.rootfs_header([0xFF; 4]);
        let mut stager = fx.stager(RAM_END);

        let images = stager.stage_all(&table(Some(ROOTFS))).unwrap();
        assert_eq!(images.root_filesystem, None);
        assert_eq!(fx.trace.events().last(), Some(&Event::Publish));
    }

    #[test]
    fn test_required_rootfs_is_fatal_when_erased() {
        let mut fx = Fixture::new();
        fx.kernel_header([0x00, 0x10, 0x00, 0x00, 0x00]);
        fx.rootfs_header([0xFF; 4]);
        let mut stager = fx.stager(RAM_END);

        let required = ImageDescriptor {
            required: true,
            ..ROOTFS
        };
        assert_eq!(
            stager.stage_all(&table(Some(required))),
            Err(Error::ImageNotFound(ImageName::RootFilesystem))
        );
    }

    #[test]
    fn test_rootfs_always_decompressed() {
        let mut fx = Fixture::new();
        fx.kernel_header([0x00, 0x10, 0x00, 0x00, 0x00]);
        fx.rootfs_header([0x40, 0x00, 0x00, 0x00]);
        let mut stager = fx.stager(OutputBound::Descriptor);

        let images = stager.stage_all(&table(Some(ROOTFS))).unwrap();
        let rootfs = images.root_filesystem.unwrap();
        assert_eq!(rootfs.compression, Compression::Lz4);
        assert_eq!(rootfs.stored_len, 0x40);
        assert!(fx.trace.events().contains(&Event::Decompress {
            src_len: 0x40,
            capacity: ROOTFS.fixed_size,
        }));
    }

    #[test]
    fn test_staging_order_and_publish() {
        let mut fx = Fixture::new();
        fx.kernel_header([0x00, 0x10, 0x00, 0x00, 0x00]);
        let base = fx.flash.as_ptr() as usize;
        let mut stager = fx.stager(RAM_END);

        stager.stage_all(&table(None)).unwrap();

        let at = |desc: &ImageDescriptor| {
            let addr = base + (desc.flash_offset - ORIGIN) as usize;
            fx.trace
                .position(|e| matches!(e, Event::Invalidate { addr: a, .. } if *a == addr))
                .unwrap()
        };
        assert!(at(&KERNEL) < at(&DTB));
        assert!(at(&DTB) < at(&FIRMWARE));
        assert_eq!(fx.trace.events().last(), Some(&Event::Publish));
    }

    #[test]
    fn test_bounded_raw_copy_rejects_oversized_kernel() {
        let mut fx = Fixture::new();
        fx.kernel_header([0x00, 0x01, 0x08, 0x00, 0x00]);
        let mut stager = fx.stager(OutputBound::Descriptor);

        assert_eq!(
            stager.stage(&KERNEL),
            Err(Error::ImageTooLarge {
                image: ImageName::Kernel,
                length: 0x801,
                capacity: KERNEL.fixed_size,
            })
        );
    }

    #[test]
    fn test_decompressor_failure_is_reported() {
        let mut fx = Fixture::new();
        fx.kernel_header([0x01, 0x10, 0x00, 0x00, 0x00]);
        let mut stager = fx.stager(OutputBound::Descriptor);
        let small = ImageDescriptor {
            fixed_size: 0x100,
            ..KERNEL
        };

        assert_eq!(
            stager.stage(&small),
            Err(Error::Decompression {
                image: ImageName::Kernel,
                cause: crate::DecompressError::OutputOverflow,
            })
        );
    }
}

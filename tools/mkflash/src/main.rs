//! mkflash - D0 flash image packer
//!
//! Builds the flash region the BL808 D0 loader reads, starting at flash
//! offset 0x100000.
//!
//! # Usage
//! ```text
//! mkflash --variant ox64 --spl spl.bin --dtb hw.dtb --firmware fw_jump.bin \
//!         --kernel Image --rootfs initrd --compress -o d0-flash.bin
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bootcore::layout::{self, XIP_ORIGIN};
use bootcore::DescriptorTable;
use clap::{Parser, ValueEnum};
use log::info;
use mkflash::{Images, pack};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Variant {
    /// Sipeed M1s (no root filesystem)
    M1s,
    /// Pine64 Ox64 (with compressed root filesystem)
    Ox64,
}

impl Variant {
    fn table(self) -> DescriptorTable {
        match self {
            Variant::M1s => layout::M1S,
            Variant::Ox64 => layout::OX64,
        }
    }
}

#[derive(Debug, Parser)]
#[command(version, about = "Pack boot images into a D0 flash region image")]
struct Args {
    /// Board variant, selects the image table
    #[arg(long, value_enum, default_value = "m1s", env = "D0_VARIANT")]
    variant: Variant,

    /// Loader binary placed at the start of the region
    #[arg(long)]
    spl: Option<PathBuf>,

    /// Flattened device tree
    #[arg(long)]
    dtb: PathBuf,

    /// Firmware the loader jumps into (e.g. OpenSBI fw_jump.bin)
    #[arg(long)]
    firmware: PathBuf,

    /// Kernel image
    #[arg(long)]
    kernel: PathBuf,

    /// Root filesystem, always stored compressed
    #[arg(long)]
    rootfs: Option<PathBuf>,

    /// Store the kernel LZ4 compressed
    #[arg(long)]
    compress: bool,

    /// Output file
    #[arg(short, long)]
    output: PathBuf,
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn read_opt(path: Option<&PathBuf>) -> Result<Option<Vec<u8>>> {
    path.map(|p| read(p)).transpose()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let images = Images {
        spl: read_opt(args.spl.as_ref())?,
        device_tree: read(&args.dtb)?,
        firmware: read(&args.firmware)?,
        kernel: read(&args.kernel)?,
        root_filesystem: read_opt(args.rootfs.as_ref())?,
    };

    let image = pack(&args.variant.table(), &images, args.compress)?;
    fs::write(&args.output, &image)
        .with_context(|| format!("writing {}", args.output.display()))?;

    info!(
        "wrote {} ({:#x} bytes, flash {:#x}..{:#x})",
        args.output.display(),
        image.len(),
        XIP_ORIGIN,
        XIP_ORIGIN as usize + image.len()
    );

    println!();
    println!("To program the D0 region:");
    println!("  BLDevCube: add {} at address {:#x}", args.output.display(), XIP_ORIGIN);
    println!(
        "  bflb-iot-tool: --addr {:#x} --firmware {} --single",
        XIP_ORIGIN,
        args.output.display()
    );

    Ok(())
}

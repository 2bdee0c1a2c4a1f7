//! Build orchestration for the D0 loader.
//!
//! Usage:
//!   cargo xtask build <variant> [--bounded-decompression]
//!   cargo xtask objdump <variant>
//!   cargo xtask image <variant> --dtb .. --firmware .. --kernel .. [--rootfs ..]
//!   cargo xtask flash <variant>
//!   cargo xtask clean
//!
//! Variants: m1s, ox64

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

const RUST_TARGET: &str = "riscv64gc-unknown-none-elf";
const PACKAGE: &str = "spl-bl808-d0";
const BIN_NAME: &str = "spl";

const VARIANTS: &[(&str, &str)] = &[
    // (name, cargo feature)
    ("m1s", "variant-m1s"),
    ("ox64", "variant-ox64"),
];

#[derive(Debug, Parser)]
#[command(about = "D0 loader build system")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Build the loader and convert it to a flat binary
    Build {
        variant: String,
        /// Cap decompressed images at their descriptor size
        #[arg(long)]
        bounded_decompression: bool,
    },
    /// Disassemble the loader ELF
    Objdump { variant: String },
    /// Build the loader and pack it with the boot images via mkflash
    Image {
        variant: String,
        #[arg(long)]
        dtb: PathBuf,
        #[arg(long)]
        firmware: PathBuf,
        #[arg(long)]
        kernel: PathBuf,
        #[arg(long)]
        rootfs: Option<PathBuf>,
        /// Store the kernel LZ4 compressed
        #[arg(long)]
        compress: bool,
    },
    /// Print how to program a built image
    Flash { variant: String },
    /// Clean build artifacts
    Clean,
}

fn main() -> Result<()> {
    match Cli::parse().command {
        Cmd::Build {
            variant,
            bounded_decompression,
        } => build_variant(&variant, bounded_decompression).map(|_| ()),
        Cmd::Objdump { variant } => objdump_variant(&variant),
        Cmd::Image {
            variant,
            dtb,
            firmware,
            kernel,
            rootfs,
            compress,
        } => image_variant(&variant, &dtb, &firmware, &kernel, rootfs.as_deref(), compress),
        Cmd::Flash { variant } => flash_variant(&variant),
        Cmd::Clean => clean(),
    }
}

fn project_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn release_dir() -> PathBuf {
    project_root().join("target").join(RUST_TARGET).join("release")
}

fn find_variant(name: &str) -> Result<&'static str> {
    match VARIANTS.iter().find(|(n, _)| *n == name) {
        Some((_, feature)) => Ok(*feature),
        None => bail!(
            "unknown variant {name}, available: {:?}",
            VARIANTS.iter().map(|v| v.0).collect::<Vec<_>>()
        ),
    }
}

fn run(cmd: &mut Command) -> Result<()> {
    let status = cmd
        .status()
        .with_context(|| format!("failed to run {:?}", cmd.get_program()))?;
    if !status.success() {
        bail!("{:?} failed with {status}", cmd.get_program());
    }
    Ok(())
}

fn build_variant(name: &str, bounded: bool) -> Result<PathBuf> {
    let feature = find_variant(name)?;
    println!("Building {PACKAGE} ({name}) for {RUST_TARGET}...");

    let root = project_root();
    let linker_script = root.join("platform").join("bl808-d0").join("linker.ld");

    let mut features = format!("bare-metal,{feature}");
    if bounded {
        features.push_str(",bounded-decompression");
    }

    run(Command::new("cargo")
        .current_dir(&root)
        .args(["build", "--release", "--package", PACKAGE, "--target", RUST_TARGET])
        .args(["--no-default-features", "--features", &features])
        .env("RUSTFLAGS", format!("-C link-arg=-T{}", linker_script.display())))?;

    let elf_path = release_dir().join(BIN_NAME);
    let bin_path = release_dir().join(format!("{BIN_NAME}-{name}.bin"));

    println!("Converting ELF to binary...");
    run(Command::new(find_objcopy())
        .args(["-O", "binary"])
        .arg(&elf_path)
        .arg(&bin_path))?;

    let size = std::fs::metadata(&bin_path)
        .with_context(|| format!("reading {}", bin_path.display()))?
        .len();
    println!();
    println!("Build complete!");
    println!("  ELF: {}", elf_path.display());
    println!("  BIN: {}", bin_path.display());
    println!("  Size: {} bytes ({:.1} KB of 64 KB)", size, size as f64 / 1024.0);
    Ok(bin_path)
}

fn tool_available(name: &str) -> bool {
    Command::new(name).arg("--version").output().is_ok()
}

fn find_objcopy() -> &'static str {
    for tool in ["rust-objcopy", "llvm-objcopy", "riscv64-unknown-elf-objcopy"] {
        if tool_available(tool) {
            return tool;
        }
    }

    println!("Warning: Could not find objcopy. Install cargo-binutils:");
    println!("  cargo install cargo-binutils");
    println!("  rustup component add llvm-tools");
    "rust-objcopy"
}

fn objdump_variant(name: &str) -> Result<()> {
    find_variant(name)?;
    let elf_path = release_dir().join(BIN_NAME);
    if !elf_path.exists() {
        bail!("ELF not found. Run 'cargo xtask build {name}' first.");
    }

    let objdump = if tool_available("rust-objdump") {
        "rust-objdump"
    } else {
        "llvm-objdump"
    };
    run(Command::new(objdump)
        .args(["-d", "--no-show-raw-insn"])
        .arg(&elf_path))
}

fn image_variant(
    name: &str,
    dtb: &Path,
    firmware: &Path,
    kernel: &Path,
    rootfs: Option<&Path>,
    compress: bool,
) -> Result<()> {
    let spl = build_variant(name, false)?;
    let out = release_dir().join(format!("d0-flash-{name}.bin"));

    let mut cmd = Command::new("cargo");
    cmd.current_dir(project_root())
        .args(["run", "--release", "--package", "mkflash", "--"])
        .args(["--variant", name])
        .arg("--spl")
        .arg(&spl)
        .arg("--dtb")
        .arg(dtb)
        .arg("--firmware")
        .arg(firmware)
        .arg("--kernel")
        .arg(kernel)
        .arg("-o")
        .arg(&out);
    if let Some(rootfs) = rootfs {
        cmd.arg("--rootfs").arg(rootfs);
    }
    if compress {
        cmd.arg("--compress");
    }
    run(&mut cmd)
}

fn flash_variant(name: &str) -> Result<()> {
    find_variant(name)?;
    let image = release_dir().join(format!("d0-flash-{name}.bin"));
    if !image.exists() {
        bail!("Image not found. Run 'cargo xtask image {name} ...' first.");
    }

    println!("Image: {}", image.display());
    println!();
    println!("The D0 region starts at flash offset 0x100000. The M0 low loader");
    println!("and its own images stay where they are.");
    println!();
    println!("With BLDevCube: add the image at address 0x100000.");
    println!("With bflb-iot-tool:");
    println!(
        "  bflb-iot-tool --chipname bl808 --port /dev/ttyUSB1 --baudrate 2000000 \\"
    );
    println!("      --addr 0x100000 --firmware {} --single", image.display());
    Ok(())
}

fn clean() -> Result<()> {
    println!("Cleaning build artifacts...");
    run(Command::new("cargo").current_dir(project_root()).arg("clean"))?;
    println!("Clean complete!");
    Ok(())
}

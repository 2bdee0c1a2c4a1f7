//! # bootcore
//!
//! Platform-agnostic half of the D0 secondary program loader.
//! Apart from the image placement in [`layout`], nothing here knows an
//! address: the platform crate picks the descriptor table, maps the XIP
//! window, builds the PMP layout and supplies the hardware collaborators
//! through the traits in [`traits`].
//!
//! ```text
//! DescriptorTable ─► XipWindow ─► Stager ─► publish ─► PmpTable ─► handoff
//! ```

#![cfg_attr(not(test), no_std)]

pub mod error;
pub mod flash;
pub mod fmt;
pub mod image;
pub mod layout;
pub mod logger;
pub mod lz4;
pub mod mcor;
pub mod panic;
pub mod pmp;
pub mod sequence;
pub mod stager;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{DecompressError, Error, Result};
pub use flash::XipWindow;
pub use image::{DescriptorTable, ImageDescriptor, ImageHeader, ImageName};
pub use mcor::Mcor;
pub use pmp::{PmpPermissions, PmpRegion, PmpTable, PmpTableBuilder};
pub use stager::{BootImages, OutputBound, StagedImage, Stager};
pub use traits::*;

//! Loader error types.
//!
//! Every variant is fatal for the boot attempt: the sequence logs it and
//! parks the hart. Nothing here is retryable because flash contents cannot
//! change without external re-programming.

use crate::image::ImageName;

/// Result type for loader operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Loader error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The length field still holds the blank-flash pattern.
    #[error("{0} image not found (length field is erased)")]
    ImageNotFound(ImageName),

    /// The decompression collaborator rejected the stream.
    #[error("{image} image failed to decompress: {cause}")]
    Decompression {
        image: ImageName,
        cause: DecompressError,
    },

    /// Header bytes do not match the image's header layout.
    #[error("{image} header is {actual} bytes, expected {expected}")]
    HeaderLength {
        image: ImageName,
        expected: usize,
        actual: usize,
    },

    /// The image is a fixed-size blob without a header.
    #[error("{0} image has no header")]
    NoHeader(ImageName),

    /// A raw copy would run past the capacity allowed for the destination.
    #[error("{image} image is {length:#x} bytes, destination holds {capacity:#x}")]
    ImageTooLarge {
        image: ImageName,
        length: usize,
        capacity: usize,
    },

    /// Requested range is not covered by the XIP window.
    #[error("flash range {offset:#x}+{length:#x} is outside the XIP window")]
    FlashRange { offset: u32, length: usize },

    /// Region cannot be expressed as a naturally aligned power of two.
    #[error("PMP region {address:#x}+{size:#x} is not NAPOT encodable")]
    InvalidPmpRegion { address: usize, size: usize },

    /// More regions than the hardware has entries.
    #[error("PMP table is full")]
    PmpTableFull,
}

/// Failures reported by a [`Decompressor`](crate::Decompressor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecompressError {
    /// Stream does not start with the expected magic.
    #[error("bad stream magic")]
    BadMagic,
    /// A chunk header announces more bytes than the source holds.
    #[error("truncated stream")]
    Truncated,
    /// Block data is malformed.
    #[error("corrupt block")]
    Corrupt,
    /// Decoded data does not fit the destination.
    #[error("output overflow")]
    OutputOverflow,
}

//! LZ4 legacy-format decompressor.
//!
//! This is the framing produced by `lz4 -l` and used for compressed Linux
//! kernels: a 4-byte magic, then chunks of `u32` compressed length followed
//! by one raw LZ4 block decoding to at most 8 MiB. A repeated magic starts
//! a concatenated stream. Up to four trailing bytes that cannot hold a chunk
//! (the kbuild size suffix) are ignored.
//!
//! The block algorithm itself comes from `lz4_flex`.

use lz4_flex::block::{self, DecompressError as BlockError};

use crate::error::DecompressError;
use crate::traits::Decompressor;

/// Stream magic, stored little-endian.
pub const LEGACY_MAGIC: u32 = 0x184C_2102;

/// Largest output of one chunk.
pub const LEGACY_CHUNK_SIZE: usize = 8 << 20;

const WORD: usize = 4;

/// Decoder for legacy LZ4 streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lz4Legacy;

impl Lz4Legacy {
    pub const fn new() -> Self {
        Self
    }
}

fn word(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn block_error(e: BlockError) -> DecompressError {
    match e {
        BlockError::OutputTooSmall { .. } => DecompressError::OutputOverflow,
        BlockError::ExpectedAnotherByte => DecompressError::Truncated,
        _ => DecompressError::Corrupt,
    }
}

impl Decompressor for Lz4Legacy {
    fn decompress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize, DecompressError> {
        if src.len() < WORD || word(src) != LEGACY_MAGIC {
            return Err(DecompressError::BadMagic);
        }

        let mut input = &src[WORD..];
        let mut produced = 0;

        while input.len() > WORD {
            let chunk = word(input);
            input = &input[WORD..];
            if chunk == LEGACY_MAGIC {
                continue;
            }

            let chunk = chunk as usize;
            if chunk > input.len() {
                return Err(DecompressError::Truncated);
            }
            let (data, rest) = input.split_at(chunk);

            let end = produced + LEGACY_CHUNK_SIZE.min(dst.len() - produced);
            produced += block::decompress_into(data, &mut dst[produced..end]).map_err(block_error)?;
            input = rest;
        }

        Ok(produced)
    }
}

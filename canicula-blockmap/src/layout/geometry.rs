//! On-disk layout constants and tier arithmetic.
//!
//! Block size and direct pointer count are fixed at build time from
//! `build-config/blockmap.toml`. Everything else is derived from them.

use crate::error::{BlockMapError, Result};

/// Parse a decimal build-config value at compile time.
const fn parse_usize(value: &str) -> usize {
    let bytes = value.as_bytes();
    let mut out = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        let digit = bytes[i];
        assert!(digit.is_ascii_digit(), "layout constant must be a decimal integer");
        out = out * 10 + (digit - b'0') as usize;
        i += 1;
    }
    out
}

/// Bytes per block.
pub const BLOCK_SIZE: usize = parse_usize(env!("BLOCKMAP_BLOCK_SIZE"));

/// Direct pointers stored in the inode (D).
pub const NR_DIRECT_BLOCKS: usize = parse_usize(env!("BLOCKMAP_NR_DIRECT_BLOCKS"));

/// Width of one on-disk block pointer.
pub const POINTER_SIZE: usize = 4;

/// Pointers held by one indirect block (D₁).
pub const NR_INDIRECT_BLOCKS: usize = BLOCK_SIZE / POINTER_SIZE;

/// Logical blocks reachable through the double-indirect block (D₁²).
pub const NR_DINDIRECT_BLOCKS: usize = NR_INDIRECT_BLOCKS * NR_INDIRECT_BLOCKS;

/// First logical block served by the single-indirect tier.
pub const INDIRECT_START: u64 = NR_DIRECT_BLOCKS as u64;

/// First logical block served by the double-indirect tier.
pub const DINDIRECT_START: u64 = INDIRECT_START + NR_INDIRECT_BLOCKS as u64;

/// Total addressable logical blocks; anything at or past this is too large.
pub const MAX_LOGICAL_BLOCKS: u64 = DINDIRECT_START + NR_DINDIRECT_BLOCKS as u64;

/// Largest representable file size in bytes.
pub const MAX_FILE_SIZE: u64 = MAX_LOGICAL_BLOCKS * BLOCK_SIZE as u64;

const _: () = assert!(BLOCK_SIZE >= POINTER_SIZE && BLOCK_SIZE % POINTER_SIZE == 0);
const _: () = assert!(NR_DIRECT_BLOCKS > 0);

/// Where a logical block lives in the three-tier map.
///
/// Indices are relative to the start of their tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Slot in `i_block_nr`.
    Direct(usize),
    /// Slot in the indirect block.
    Indirect(usize),
    /// `outer` selects the indirect block inside the double-indirect block,
    /// `inner` the slot inside that indirect block.
    DoubleIndirect { outer: usize, inner: usize },
}

impl Tier {
    /// Classify `logical`, or fail with `FileTooLarge` past the last tier.
    pub fn locate(logical: u64) -> Result<Tier> {
        if logical < INDIRECT_START {
            return Ok(Tier::Direct(logical as usize));
        }
        if logical < DINDIRECT_START {
            return Ok(Tier::Indirect((logical - INDIRECT_START) as usize));
        }
        if logical < MAX_LOGICAL_BLOCKS {
            let rel = (logical - DINDIRECT_START) as usize;
            return Ok(Tier::DoubleIndirect {
                outer: rel / NR_INDIRECT_BLOCKS,
                inner: rel % NR_INDIRECT_BLOCKS,
            });
        }
        Err(BlockMapError::FileTooLarge)
    }
}

/// Number of blocks needed to hold `size` bytes.
pub fn blocks_for_size(size: u64) -> u64 {
    size.div_ceil(BLOCK_SIZE as u64)
}

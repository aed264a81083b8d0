use alloc::boxed::Box;

use super::geometry::{BLOCK_SIZE, NR_INDIRECT_BLOCKS, POINTER_SIZE};
use super::{read_u32_le, write_u32_le};
use crate::error::{BlockMapError, Result};

/// Parsed indirect or double-indirect block.
///
/// A block worth of little-endian `u32` block numbers. 0 marks an empty slot.
#[derive(Clone, PartialEq, Eq)]
pub struct PointerBlock {
    entries: Box<[u32; NR_INDIRECT_BLOCKS]>,
}

impl PointerBlock {
    /// A block with every slot empty.
    pub fn zeroed() -> Self {
        Self {
            entries: Box::new([0u32; NR_INDIRECT_BLOCKS]),
        }
    }

    /// Parse a pointer block from raw block bytes.
    ///
    /// `raw.len()` must equal `BLOCK_SIZE`.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() != BLOCK_SIZE {
            return Err(BlockMapError::CorruptedFs("pointer block has wrong length"));
        }
        let mut block = Self::zeroed();
        for (idx, slot) in block.entries.iter_mut().enumerate() {
            *slot = read_u32_le(raw, idx * POINTER_SIZE);
        }
        Ok(block)
    }

    /// Encode into `out`, which must be exactly one block long.
    pub fn serialize(&self, out: &mut [u8]) -> Result<()> {
        if out.len() != BLOCK_SIZE {
            return Err(BlockMapError::CorruptedFs("pointer block buffer has wrong length"));
        }
        for (idx, &slot) in self.entries.iter().enumerate() {
            write_u32_le(out, idx * POINTER_SIZE, slot);
        }
        Ok(())
    }

    pub fn get(&self, idx: usize) -> Result<u32> {
        self.entries
            .get(idx)
            .copied()
            .ok_or(BlockMapError::CorruptedFs("pointer slot out of range"))
    }

    pub fn set(&mut self, idx: usize, block_no: u32) -> Result<()> {
        let slot = self
            .entries
            .get_mut(idx)
            .ok_or(BlockMapError::CorruptedFs("pointer slot out of range"))?;
        *slot = block_no;
        Ok(())
    }

    /// Iterate over `(slot, block_no)` for every non-empty slot.
    pub fn allocated(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.entries
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, block_no)| block_no != 0)
    }
}

impl core::fmt::Debug for PointerBlock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.allocated()).finish()
    }
}

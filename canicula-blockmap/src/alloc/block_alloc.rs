use alloc::vec;
use alloc::vec::Vec;

use log::debug;

use crate::error::{BlockMapError, Result};
use crate::fs_alloc::bitmap::Bitmap;
use crate::traits::allocator::BlockAllocator;

/// In-memory bitmap allocator over a whole device.
///
/// Bit `n` tracks block `n`. Blocks below `first_data_block` (always at least
/// block 0) are reserved at construction and never handed out. Every
/// allocated block remembers its owning inode so frees can be checked.
pub struct BitmapBlockAllocator {
    pub first_data_block: u32,
    pub free_blocks_total: u64,
    bitmap: Bitmap,
    owners: Vec<Option<u32>>,
}

impl BitmapBlockAllocator {
    /// Allocator for a device of `total_blocks` blocks.
    pub fn new(total_blocks: u32, first_data_block: u32) -> Self {
        let first_data_block = first_data_block.clamp(1, total_blocks.max(1));
        let mut bitmap = Bitmap::new(total_blocks as usize);
        for bit in 0..first_data_block.min(total_blocks) as usize {
            bitmap.set(bit);
        }
        Self {
            first_data_block,
            free_blocks_total: bitmap.count_zeros() as u64,
            bitmap,
            owners: vec![None; total_blocks as usize],
        }
    }

    /// Owner of an allocated block, `None` if free or reserved.
    pub fn owner_of(&self, block_no: u32) -> Option<u32> {
        let bit = self.bit_of(block_no).ok()?;
        self.owners[bit]
    }

    /// Block that the next `alloc_block` call would return.
    pub fn peek_next_free(&self) -> Option<u32> {
        self.bitmap
            .first_zero(self.first_data_block as usize)
            .map(|bit| bit as u32)
    }

    fn bit_of(&self, block_no: u32) -> Result<usize> {
        if block_no < self.first_data_block {
            return Err(BlockMapError::CorruptedFs("block below first_data_block"));
        }
        if block_no as usize >= self.bitmap.len_bits() {
            return Err(BlockMapError::CorruptedFs("block out of allocator range"));
        }
        Ok(block_no as usize)
    }
}

impl BlockAllocator for BitmapBlockAllocator {
    fn alloc_block(&mut self, owner: u32) -> Result<u32> {
        let bit = self.peek_next_free().ok_or(BlockMapError::NoSpace)? as usize;
        self.bitmap.set(bit);
        self.owners[bit] = Some(owner);
        self.free_blocks_total -= 1;
        debug!("alloc block {} for ino {}", bit, owner);
        Ok(bit as u32)
    }

    fn free_block(&mut self, owner: u32, block_no: u32) -> Result<()> {
        let bit = self.bit_of(block_no)?;
        if !self.bitmap.get(bit) {
            return Err(BlockMapError::CorruptedFs("double free block"));
        }
        if self.owners[bit] != Some(owner) {
            return Err(BlockMapError::CorruptedFs("block not owned by inode"));
        }

        self.bitmap.clear(bit);
        self.owners[bit] = None;
        self.free_blocks_total += 1;
        Ok(())
    }

    fn free_block_count(&self) -> u64 {
        self.free_blocks_total
    }
}

#[cfg(test)]
mod tests {
    use super::BitmapBlockAllocator;
    use crate::error::BlockMapError;
    use crate::traits::allocator::BlockAllocator;

    #[test]
    fn test_alloc_lowest_free_block_first() {
        let mut alloc = BitmapBlockAllocator::new(16, 3);
        assert_eq!(alloc.free_block_count(), 13);

        assert_eq!(alloc.alloc_block(7), Ok(3));
        assert_eq!(alloc.alloc_block(7), Ok(4));
        alloc.free_block(7, 3).unwrap();
        assert_eq!(alloc.alloc_block(8), Ok(3));
        assert_eq!(alloc.owner_of(3), Some(8));
        assert_eq!(alloc.owner_of(4), Some(7));
        assert_eq!(alloc.owner_of(5), None);
        assert_eq!(alloc.free_block_count(), 11);
    }

    #[test]
    fn test_block_zero_is_never_handed_out() {
        let mut alloc = BitmapBlockAllocator::new(4, 0);
        assert_eq!(alloc.first_data_block, 1);
        assert_eq!(alloc.alloc_block(1), Ok(1));
        assert_eq!(alloc.alloc_block(1), Ok(2));
        assert_eq!(alloc.alloc_block(1), Ok(3));
        assert_eq!(alloc.alloc_block(1), Err(BlockMapError::NoSpace));
        assert_eq!(alloc.free_block_count(), 0);
    }

    #[test]
    fn test_free_checks_state_and_owner() {
        let mut alloc = BitmapBlockAllocator::new(16, 1);
        let block = alloc.alloc_block(5).unwrap();

        assert_eq!(
            alloc.free_block(6, block),
            Err(BlockMapError::CorruptedFs("block not owned by inode"))
        );
        alloc.free_block(5, block).unwrap();
        assert_eq!(
            alloc.free_block(5, block),
            Err(BlockMapError::CorruptedFs("double free block"))
        );
        assert!(alloc.free_block(5, 0).is_err());
        assert!(alloc.free_block(5, 16).is_err());
        assert_eq!(alloc.free_block_count(), 15);
    }

    #[test]
    fn test_blocks_below_first_data_block_are_skipped() {
        let mut alloc = BitmapBlockAllocator::new(8, 3);
        assert_eq!(alloc.peek_next_free(), Some(3));
        assert_eq!(alloc.owner_of(1), None);
        assert_eq!(alloc.free_block_count(), 5);
        assert_eq!(
            alloc.free_block(1, 2),
            Err(BlockMapError::CorruptedFs("block below first_data_block"))
        );
    }
}

use crate::error::Result;

/// Hands out and reclaims physical blocks on behalf of an owning inode.
///
/// The block map only ever asks for one block at a time and never expresses a
/// placement preference.
pub trait BlockAllocator {
    /// Reserve one free block for inode `owner`.
    ///
    /// The returned number is never 0. Callers treat the block content as
    /// zero; they never read a freshly allocated block before writing it.
    /// Fails with `NoSpace` when the allocator is exhausted.
    fn alloc_block(&mut self, owner: u32) -> Result<u32>;

    /// Release `block_no`, which must currently be owned by `owner`.
    fn free_block(&mut self, owner: u32, block_no: u32) -> Result<()>;

    /// Total remaining free block count.
    fn free_block_count(&self) -> u64;
}

impl<T: BlockAllocator + ?Sized> BlockAllocator for &mut T {
    fn alloc_block(&mut self, owner: u32) -> Result<u32> {
        (**self).alloc_block(owner)
    }

    fn free_block(&mut self, owner: u32, block_no: u32) -> Result<()> {
        (**self).free_block(owner, block_no)
    }

    fn free_block_count(&self) -> u64 {
        (**self).free_block_count()
    }
}

use alloc::vec;

use log::debug;

use crate::error::Result;
use crate::io::block_reader::BlockReader;
use crate::layout::geometry::{BLOCK_SIZE, NR_DIRECT_BLOCKS, NR_INDIRECT_BLOCKS, blocks_for_size};
use crate::layout::inode::Inode;
use crate::traits::allocator::BlockAllocator;
use crate::traits::block_device::BlockDevice;

/// Releases every block owned by an inode.
pub struct BlockReclaimer;

impl BlockReclaimer {
    /// Free all data and pointer blocks of `inode` and reset it to an empty
    /// file.
    ///
    /// Data blocks are freed up to `i_size`; every pointer block the inode
    /// references is freed regardless. Each pointer is cleared right after
    /// its block is released. Pointer blocks themselves are not rewritten:
    /// once their owner is freed their content is dead.
    pub fn free_all<D: BlockDevice, A: BlockAllocator>(
        reader: &BlockReader<D>,
        allocator: &mut A,
        inode: &mut Inode,
    ) -> Result<()> {
        let owner = inode.ino;
        let total = blocks_for_size(inode.i_size);
        let mut scratch = vec![0u8; BLOCK_SIZE];
        let mut freed = 0u64;

        let direct = core::cmp::min(total, NR_DIRECT_BLOCKS as u64) as usize;
        for slot in inode.i_block_nr[..direct].iter_mut() {
            if *slot != 0 {
                allocator.free_block(owner, *slot)?;
                *slot = 0;
                freed += 1;
            }
        }
        let mut remaining = total - direct as u64;

        if inode.i_indirect != 0 {
            let span = core::cmp::min(remaining, NR_INDIRECT_BLOCKS as u64) as usize;
            let table = reader.read_pointer_block(inode.i_indirect, &mut scratch)?;
            for (_, block_no) in table.allocated().take_while(|&(slot, _)| slot < span) {
                allocator.free_block(owner, block_no)?;
                freed += 1;
            }
            allocator.free_block(owner, inode.i_indirect)?;
            inode.i_indirect = 0;
            freed += 1;
        }
        remaining = remaining.saturating_sub(NR_INDIRECT_BLOCKS as u64);

        // Every referenced indirect block is released even past `i_size`;
        // only data slots are bounded by it.
        if inode.i_dindirect != 0 {
            let mut dtable = reader.read_pointer_block(inode.i_dindirect, &mut scratch)?;
            for outer in 0..NR_INDIRECT_BLOCKS {
                let span = core::cmp::min(remaining, NR_INDIRECT_BLOCKS as u64);
                // An empty entry still accounts for the positions it covers.
                let indirect = dtable.get(outer)?;
                if indirect != 0 {
                    let table = reader.read_pointer_block(indirect, &mut scratch)?;
                    for (_, block_no) in table
                        .allocated()
                        .take_while(|&(slot, _)| (slot as u64) < span)
                    {
                        allocator.free_block(owner, block_no)?;
                        freed += 1;
                    }
                    allocator.free_block(owner, indirect)?;
                    dtable.set(outer, 0)?;
                    freed += 1;
                }
                remaining -= span;
            }
            allocator.free_block(owner, inode.i_dindirect)?;
            inode.i_dindirect = 0;
            freed += 1;
        }

        inode.i_size = 0;
        inode.mark_dirty();
        debug!("ino {}: reclaimed {} block(s)", owner, freed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::BlockReclaimer;
    use crate::error::BlockMapError;
    use crate::fs_core::file_writer::FileWriter;
    use crate::io::block_reader::BlockReader;
    use crate::io::block_writer::BlockWriter;
    use crate::layout::geometry::{
        BLOCK_SIZE, DINDIRECT_START, INDIRECT_START, NR_INDIRECT_BLOCKS,
    };
    use crate::layout::inode::Inode;
    use crate::testkit::{CountingAllocator, MemDevice};
    use crate::traits::allocator::BlockAllocator;

    fn write_at_block(
        device: &mut MemDevice,
        allocator: &mut CountingAllocator,
        inode: &mut Inode,
        logical: u64,
    ) {
        let offset = logical * BLOCK_SIZE as u64;
        FileWriter::write(&mut BlockWriter::new(device), allocator, inode, offset, b"data").unwrap();
    }

    #[test]
    fn test_free_all_direct_and_indirect() {
        let mut device = MemDevice::new(128);
        let mut allocator = CountingAllocator::new(128);
        let mut inode = Inode::new(6);
        let free_before = allocator.free_block_count();

        for logical in [0, 3, 9, 10, 11, 40] {
            write_at_block(&mut device, &mut allocator, &mut inode, logical);
        }
        inode.clear_dirty();
        assert_eq!(allocator.outstanding(), 7);

        BlockReclaimer::free_all(&BlockReader::new(&device), &mut allocator, &mut inode).unwrap();
        assert!(inode.has_no_blocks());
        assert_eq!(inode.i_size, 0);
        assert!(inode.is_dirty());
        assert!(allocator.balanced());
        assert_eq!(allocator.free_block_count(), free_before);
    }

    #[test]
    fn test_free_all_sparse_double_indirect() {
        let mut device = MemDevice::new(128);
        let mut allocator = CountingAllocator::new(128);
        let mut inode = Inode::new(6);

        // Entries 0 and 2 of the double-indirect block are populated, entry 1
        // stays empty.
        let d1 = NR_INDIRECT_BLOCKS as u64;
        write_at_block(&mut device, &mut allocator, &mut inode, DINDIRECT_START + 5);
        write_at_block(&mut device, &mut allocator, &mut inode, DINDIRECT_START + 2 * d1);
        write_at_block(&mut device, &mut allocator, &mut inode, DINDIRECT_START + 2 * d1 + 1);
        assert_eq!(allocator.outstanding(), 6);

        BlockReclaimer::free_all(&BlockReader::new(&device), &mut allocator, &mut inode).unwrap();
        assert!(inode.has_no_blocks());
        assert!(allocator.balanced());
    }

    #[test]
    fn test_free_all_releases_pointer_blocks_beyond_size() {
        let mut device = MemDevice::new(128);
        let mut allocator = CountingAllocator::new(128);
        let mut inode = Inode::new(6);

        // indirect = 1, data = 2; dindirect = 3, indirect = 4, data = 5.
        write_at_block(&mut device, &mut allocator, &mut inode, INDIRECT_START);
        write_at_block(&mut device, &mut allocator, &mut inode, DINDIRECT_START);
        assert_eq!(allocator.outstanding(), 5);

        // Size only covers the direct tier: both pointer trees lie beyond it.
        inode.i_size = BLOCK_SIZE as u64;
        BlockReclaimer::free_all(&BlockReader::new(&device), &mut allocator, &mut inode).unwrap();

        assert!(inode.has_no_blocks());
        assert_eq!(allocator.owner_of(1), None);
        assert_eq!(allocator.owner_of(3), None);
        assert_eq!(allocator.owner_of(4), None);
        // Data slots past the size bound stay allocated.
        assert_eq!(allocator.owner_of(2), Some(6));
        assert_eq!(allocator.owner_of(5), Some(6));
        assert_eq!(allocator.outstanding(), 2);
    }

    #[test]
    fn test_free_all_empty_inode() {
        let device = MemDevice::new(16);
        let mut allocator = CountingAllocator::new(16);
        let mut inode = Inode::new(6);

        BlockReclaimer::free_all(&BlockReader::new(&device), &mut allocator, &mut inode).unwrap();
        assert_eq!(inode.i_size, 0);
        assert_eq!(device.reads(), 0);
        assert!(allocator.balanced());
    }

    #[test]
    fn test_free_all_propagates_allocator_errors() {
        let mut device = MemDevice::new(32);
        let mut allocator = CountingAllocator::new(32);
        let mut inode = Inode::new(6);
        write_at_block(&mut device, &mut allocator, &mut inode, 0);

        // Same blocks, different owner.
        let mut stranger = inode.clone();
        stranger.ino = 99;
        assert!(matches!(
            BlockReclaimer::free_all(&BlockReader::new(&device), &mut allocator, &mut stranger),
            Err(BlockMapError::CorruptedFs(_))
        ));
        assert_eq!(allocator.outstanding(), 1);
    }
}

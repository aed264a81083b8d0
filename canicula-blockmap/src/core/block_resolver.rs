use alloc::vec;

use crate::error::Result;
use crate::io::block_reader::BlockReader;
use crate::layout::geometry::{BLOCK_SIZE, Tier};
use crate::layout::inode::Inode;
use crate::traits::block_device::BlockDevice;

/// Block resolver.
///
/// Walks the direct, single-indirect and double-indirect pointers of an inode
/// to convert logical file blocks into physical blocks. Never allocates.
pub struct BlockResolver;

impl BlockResolver {
    /// Translate `logical` and load the block content into `scratch`.
    ///
    /// Returns the physical block number, or 0 for a sparse hole, in which
    /// case `scratch` is zero-filled. `scratch` must be one block long.
    pub fn resolve<D: BlockDevice>(
        reader: &BlockReader<D>,
        inode: &Inode,
        logical: u64,
        scratch: &mut [u8],
    ) -> Result<u32> {
        let physical = Self::lookup(reader, inode, logical, scratch)?;
        if physical != 0 {
            reader.read_block(physical as u64, scratch)?;
        } else {
            scratch.fill(0);
        }
        Ok(physical)
    }

    /// Translate `logical` without loading the data block.
    ///
    /// Pointer blocks on the way are staged in `scratch`; its content is
    /// unspecified afterwards. Returns 0 for a hole.
    pub fn lookup<D: BlockDevice>(
        reader: &BlockReader<D>,
        inode: &Inode,
        logical: u64,
        scratch: &mut [u8],
    ) -> Result<u32> {
        match Tier::locate(logical)? {
            Tier::Direct(idx) => Ok(inode.i_block_nr[idx]),
            Tier::Indirect(idx) => {
                if inode.i_indirect == 0 {
                    return Ok(0);
                }
                reader.read_pointer_block(inode.i_indirect, scratch)?.get(idx)
            }
            Tier::DoubleIndirect { outer, inner } => {
                if inode.i_dindirect == 0 {
                    return Ok(0);
                }
                let indirect = reader
                    .read_pointer_block(inode.i_dindirect, scratch)?
                    .get(outer)?;
                // The whole span behind an empty entry is a hole.
                if indirect == 0 {
                    return Ok(0);
                }
                reader.read_pointer_block(indirect, scratch)?.get(inner)
            }
        }
    }

    /// Count every data and pointer block reachable from `inode`.
    pub fn mapped_blocks<D: BlockDevice>(reader: &BlockReader<D>, inode: &Inode) -> Result<u64> {
        let mut scratch = vec![0u8; BLOCK_SIZE];
        let mut count = inode.i_block_nr.iter().filter(|&&b| b != 0).count() as u64;

        if inode.i_indirect != 0 {
            let table = reader.read_pointer_block(inode.i_indirect, &mut scratch)?;
            count += 1 + table.allocated().count() as u64;
        }

        if inode.i_dindirect != 0 {
            let dtable = reader.read_pointer_block(inode.i_dindirect, &mut scratch)?;
            count += 1;
            for (_, indirect) in dtable.allocated() {
                let table = reader.read_pointer_block(indirect, &mut scratch)?;
                count += 1 + table.allocated().count() as u64;
            }
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::BlockResolver;
    use crate::error::BlockMapError;
    use crate::io::block_reader::BlockReader;
    use crate::layout::geometry::{
        BLOCK_SIZE, DINDIRECT_START, INDIRECT_START, MAX_LOGICAL_BLOCKS, NR_INDIRECT_BLOCKS,
    };
    use crate::layout::inode::Inode;
    use crate::layout::pointer_block::PointerBlock;
    use crate::testkit::MemDevice;
    use crate::traits::block_device::BlockDevice;

    fn put_table(device: &mut MemDevice, block_no: u32, slots: &[(usize, u32)]) {
        let mut table = PointerBlock::zeroed();
        for &(idx, value) in slots {
            table.set(idx, value).unwrap();
        }
        let mut raw = vec![0u8; BLOCK_SIZE];
        table.serialize(&mut raw).unwrap();
        device.write_block(block_no as u64, &raw).unwrap();
    }

    fn put_data(device: &mut MemDevice, block_no: u32, fill: u8) {
        device
            .write_block(block_no as u64, &vec![fill; BLOCK_SIZE])
            .unwrap();
    }

    #[test]
    fn test_resolve_direct_block_loads_data() {
        let mut device = MemDevice::new(64);
        put_data(&mut device, 5, 0xAB);
        let mut inode = Inode::new(1);
        inode.i_block_nr[2] = 5;

        let reader = BlockReader::new(&device);
        let mut scratch = vec![0u8; BLOCK_SIZE];
        assert_eq!(BlockResolver::resolve(&reader, &inode, 2, &mut scratch).unwrap(), 5);
        assert!(scratch.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_resolve_hole_zero_fills_scratch() {
        let device = MemDevice::new(64);
        let inode = Inode::new(1);
        let reader = BlockReader::new(&device);
        let mut scratch = vec![0xFFu8; BLOCK_SIZE];

        assert_eq!(BlockResolver::resolve(&reader, &inode, 0, &mut scratch).unwrap(), 0);
        assert!(scratch.iter().all(|&b| b == 0));

        // Unallocated indirect and double-indirect regions cost no I/O.
        scratch.fill(0xFF);
        assert_eq!(
            BlockResolver::resolve(&reader, &inode, INDIRECT_START, &mut scratch).unwrap(),
            0
        );
        assert_eq!(
            BlockResolver::resolve(&reader, &inode, DINDIRECT_START + 5, &mut scratch).unwrap(),
            0
        );
        assert!(scratch.iter().all(|&b| b == 0));
        assert_eq!(device.reads(), 0);
    }

    #[test]
    fn test_resolve_through_indirect_block() {
        let mut device = MemDevice::new(64);
        put_table(&mut device, 9, &[(3, 20)]);
        put_data(&mut device, 20, 0x11);
        let mut inode = Inode::new(1);
        inode.i_indirect = 9;

        let reader = BlockReader::new(&device);
        let mut scratch = vec![0u8; BLOCK_SIZE];
        assert_eq!(
            BlockResolver::resolve(&reader, &inode, INDIRECT_START + 3, &mut scratch).unwrap(),
            20
        );
        assert_eq!(scratch[0], 0x11);
        assert_eq!(
            BlockResolver::resolve(&reader, &inode, INDIRECT_START + 4, &mut scratch).unwrap(),
            0
        );
    }

    #[test]
    fn test_resolve_through_double_indirect_block() {
        let mut device = MemDevice::new(64);
        put_table(&mut device, 30, &[(1, 31)]);
        put_table(&mut device, 31, &[(7, 40)]);
        put_data(&mut device, 40, 0x22);
        let mut inode = Inode::new(1);
        inode.i_dindirect = 30;

        let reader = BlockReader::new(&device);
        let mut scratch = vec![0u8; BLOCK_SIZE];
        let logical = DINDIRECT_START + NR_INDIRECT_BLOCKS as u64 + 7;
        assert_eq!(
            BlockResolver::resolve(&reader, &inode, logical, &mut scratch).unwrap(),
            40
        );
        assert_eq!(scratch[BLOCK_SIZE - 1], 0x22);

        // Entry 0 of the double-indirect block is empty: one read, then a hole.
        let before = device.reads();
        assert_eq!(
            BlockResolver::lookup(&reader, &inode, DINDIRECT_START, &mut scratch).unwrap(),
            0
        );
        assert_eq!(device.reads(), before + 1);
    }

    #[test]
    fn test_resolve_past_capacity_is_file_too_large() {
        let device = MemDevice::new(64);
        let inode = Inode::new(1);
        let reader = BlockReader::new(&device);
        let mut scratch = vec![0u8; BLOCK_SIZE];

        assert_eq!(
            BlockResolver::resolve(&reader, &inode, MAX_LOGICAL_BLOCKS, &mut scratch),
            Err(BlockMapError::FileTooLarge)
        );
        assert_eq!(device.reads(), 0);
    }

    #[test]
    fn test_mapped_blocks_counts_pointer_blocks() {
        let mut device = MemDevice::new(64);
        put_table(&mut device, 9, &[(0, 10), (1, 11)]);
        put_table(&mut device, 30, &[(0, 31), (4, 32)]);
        put_table(&mut device, 31, &[(0, 33)]);
        put_table(&mut device, 32, &[]);
        let mut inode = Inode::new(1);
        inode.i_block_nr[0] = 2;
        inode.i_indirect = 9;
        inode.i_dindirect = 30;

        let reader = BlockReader::new(&device);
        // 1 direct + (1 + 2) indirect + 1 dindirect + (1 + 1) + (1 + 0)
        assert_eq!(BlockResolver::mapped_blocks(&reader, &inode).unwrap(), 8);
    }
}

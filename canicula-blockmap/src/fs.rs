use alloc::vec;

use log::debug;

use crate::error::{BlockMapError, Result, ShortWrite};
use crate::fs_core::block_reclaimer::BlockReclaimer;
use crate::fs_core::block_resolver::BlockResolver;
use crate::fs_core::file_reader::FileReader;
use crate::fs_core::file_writer::FileWriter;
use crate::io::block_reader::BlockReader;
use crate::io::block_writer::BlockWriter;
use crate::layout::geometry::BLOCK_SIZE;
use crate::layout::inode::Inode;
use crate::traits::allocator::BlockAllocator;
use crate::traits::block_device::BlockDevice;
use crate::traits::vfs::{DataOps, FileSystem, StatFs};

/// Block map bound to one device and one free-block allocator.
pub struct BlockMapFs<D: BlockDevice, A: BlockAllocator> {
    device: D,
    allocator: A,
    pub read_only: bool,
}

impl<D: BlockDevice, A: BlockAllocator> BlockMapFs<D, A> {
    /// Wire `device` and `allocator` together.
    ///
    /// Fails if the device block size differs from the compiled layout.
    pub fn new(device: D, allocator: A) -> Result<Self> {
        let found = device.block_size();
        if found != BLOCK_SIZE {
            return Err(BlockMapError::BlockSizeMismatch {
                expected: BLOCK_SIZE,
                found,
            });
        }
        debug!(
            "block map over {} blocks, {} free",
            device.total_blocks(),
            allocator.free_block_count()
        );
        Ok(Self {
            device,
            allocator,
            read_only: false,
        })
    }

    /// Physical block backing `logical`, `None` for a hole. Never allocates.
    pub fn bmap(&self, inode: &Inode, logical: u64) -> Result<Option<u64>> {
        let reader = BlockReader::new(&self.device);
        let mut scratch = vec![0u8; BLOCK_SIZE];
        let physical = BlockResolver::lookup(&reader, inode, logical, &mut scratch)?;
        Ok((physical != 0).then_some(physical as u64))
    }

    /// Data and pointer blocks currently held by `inode`.
    pub fn mapped_blocks(&self, inode: &Inode) -> Result<u64> {
        BlockResolver::mapped_blocks(&BlockReader::new(&self.device), inode)
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    pub fn allocator_mut(&mut self) -> &mut A {
        &mut self.allocator
    }

    pub fn into_parts(self) -> (D, A) {
        (self.device, self.allocator)
    }
}

impl<D: BlockDevice, A: BlockAllocator> FileSystem for BlockMapFs<D, A> {
    fn sync(&mut self) -> Result<()> {
        BlockWriter::new(&mut self.device).flush()
    }

    fn stat_fs(&self) -> Result<StatFs> {
        Ok(StatFs {
            block_size: BLOCK_SIZE as u64,
            total_blocks: self.device.total_blocks(),
            free_blocks: self.allocator.free_block_count(),
        })
    }
}

impl<D: BlockDevice, A: BlockAllocator> DataOps for BlockMapFs<D, A> {
    fn read_data(&self, inode: &Inode, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let reader = BlockReader::new(&self.device);
        FileReader::read(&reader, inode, offset, buf)
    }

    fn write_data(
        &mut self,
        inode: &mut Inode,
        offset: u64,
        data: &[u8],
    ) -> core::result::Result<usize, ShortWrite> {
        if self.read_only {
            return Err(BlockMapError::ReadOnly.into());
        }
        let mut writer = BlockWriter::new(&mut self.device);
        FileWriter::write(&mut writer, &mut self.allocator, inode, offset, data)
    }

    fn free_blocks(&mut self, inode: &mut Inode) -> Result<()> {
        if self.read_only {
            return Err(BlockMapError::ReadOnly);
        }
        let reader = BlockReader::new(&self.device);
        BlockReclaimer::free_all(&reader, &mut self.allocator, inode)
    }
}

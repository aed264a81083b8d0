use crate::error::{BlockMapError, Result};
use crate::layout::pointer_block::PointerBlock;
use crate::traits::block_device::BlockDevice;

/// Block reader wrapping a [`BlockDevice`] with higher-level read operations.
pub struct BlockReader<D: BlockDevice> {
    device: D,
}

impl<D: BlockDevice> BlockReader<D> {
    /// Create a new reader wrapping the given block device.
    pub fn new(device: D) -> Self {
        Self { device }
    }

    /// Read a single block into `buf`.
    ///
    /// `buf.len()` must equal `self.block_size()`.
    pub fn read_block(&self, block_no: u64, buf: &mut [u8]) -> Result<()> {
        self.device.read_block(block_no, buf)
    }

    /// Read `count` consecutive blocks starting at `start_block` into `buf`.
    ///
    /// `buf.len()` must equal `count * self.block_size()`.
    pub fn read_blocks(&self, start_block: u64, count: u64, buf: &mut [u8]) -> Result<()> {
        let bs = self.device.block_size();
        if buf.len() as u64 != count * bs as u64 {
            return Err(BlockMapError::IoError);
        }
        for i in 0..count {
            let offset = (i as usize) * bs;
            self.device
                .read_block(start_block + i, &mut buf[offset..offset + bs])?;
        }
        Ok(())
    }

    /// Load the indirect or double-indirect block `block_no`.
    ///
    /// The raw bytes are staged in `scratch`, which must be one block long.
    pub fn read_pointer_block(&self, block_no: u32, scratch: &mut [u8]) -> Result<PointerBlock> {
        if block_no == 0 {
            return Err(BlockMapError::CorruptedFs("pointer block at block 0"));
        }
        self.device.read_block(block_no as u64, scratch)?;
        PointerBlock::parse(scratch)
    }
}

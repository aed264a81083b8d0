use alloc::vec;

use crate::error::{BlockMapError, Result};
use crate::io::block_reader::BlockReader;
use crate::layout::pointer_block::PointerBlock;
use crate::traits::block_device::BlockDevice;

/// Block writer wrapping a [`BlockDevice`] with higher-level write operations.
pub struct BlockWriter<D: BlockDevice> {
    device: D,
}

impl<D: BlockDevice> BlockWriter<D> {
    /// Create a new writer wrapping the given block device.
    pub fn new(device: D) -> Self {
        Self { device }
    }

    /// Write a single block from `data`.
    ///
    /// `data.len()` must equal block size.
    pub fn write_block(&mut self, block_no: u64, data: &[u8]) -> Result<()> {
        if data.len() != self.device.block_size() {
            return Err(BlockMapError::IoError);
        }
        self.device.write_block(block_no, data)
    }

    /// Write `count` consecutive blocks starting at `start_block` from `data`.
    pub fn write_blocks(&mut self, start_block: u64, count: u64, data: &[u8]) -> Result<()> {
        let bs = self.device.block_size();
        if data.len() as u64 != count * bs as u64 {
            return Err(BlockMapError::IoError);
        }
        for i in 0..count {
            let offset = (i as usize) * bs;
            self.device
                .write_block(start_block + i, &data[offset..offset + bs])?;
        }
        Ok(())
    }

    /// Persist an indirect or double-indirect block.
    pub fn write_pointer_block(&mut self, block_no: u32, table: &PointerBlock) -> Result<()> {
        if block_no == 0 {
            return Err(BlockMapError::CorruptedFs("pointer block at block 0"));
        }
        let mut raw = vec![0u8; self.device.block_size()];
        table.serialize(&mut raw)?;
        self.device.write_block(block_no as u64, &raw)
    }

    /// Flush pending writes.
    pub fn flush(&mut self) -> Result<()> {
        self.device.flush()
    }

    /// Build a temporary read wrapper borrowing the same device.
    pub fn as_reader(&self) -> BlockReader<&D> {
        BlockReader::new(&self.device)
    }
}

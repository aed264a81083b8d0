use crate::error::BlockMapError;

/// Block device abstraction, the I/O foundation for the block map.
///
/// Implementations may back onto real disk, memory image, or network block device.
/// Block 0 is never handed out for file data; a pointer value of 0 means "no block".
pub trait BlockDevice {
    /// Read a single block into `buf`.
    ///
    /// `buf.len()` must equal `self.block_size()`.
    fn read_block(&self, block_no: u64, buf: &mut [u8]) -> ::core::result::Result<(), BlockMapError>;

    /// Write `buf` to a single block.
    ///
    /// Read-only implementations may return `Err(ReadOnly)`.
    fn write_block(&mut self, block_no: u64, buf: &[u8]) -> ::core::result::Result<(), BlockMapError>;

    /// Block size in bytes.
    fn block_size(&self) -> usize;

    /// Total number of blocks on the device.
    fn total_blocks(&self) -> u64;

    /// Flush all pending writes to stable storage.
    fn flush(&mut self) -> ::core::result::Result<(), BlockMapError>;
}

impl<T: BlockDevice + ?Sized> BlockDevice for &mut T {
    fn read_block(&self, block_no: u64, buf: &mut [u8]) -> ::core::result::Result<(), BlockMapError> {
        (**self).read_block(block_no, buf)
    }

    fn write_block(&mut self, block_no: u64, buf: &[u8]) -> ::core::result::Result<(), BlockMapError> {
        (**self).write_block(block_no, buf)
    }

    fn block_size(&self) -> usize {
        (**self).block_size()
    }

    fn total_blocks(&self) -> u64 {
        (**self).total_blocks()
    }

    fn flush(&mut self) -> ::core::result::Result<(), BlockMapError> {
        (**self).flush()
    }
}

impl<T: BlockDevice + ?Sized> BlockDevice for &T {
    fn read_block(&self, block_no: u64, buf: &mut [u8]) -> ::core::result::Result<(), BlockMapError> {
        (**self).read_block(block_no, buf)
    }

    fn write_block(
        &mut self,
        _block_no: u64,
        _buf: &[u8],
    ) -> ::core::result::Result<(), BlockMapError> {
        Err(BlockMapError::ReadOnly)
    }

    fn block_size(&self) -> usize {
        (**self).block_size()
    }

    fn total_blocks(&self) -> u64 {
        (**self).total_blocks()
    }

    fn flush(&mut self) -> ::core::result::Result<(), BlockMapError> {
        Ok(())
    }
}

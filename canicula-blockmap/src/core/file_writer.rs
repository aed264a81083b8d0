use alloc::vec;

use log::{debug, warn};

use crate::error::{BlockMapError, Result, ShortWrite};
use crate::fs_core::block_mapper::BlockMapper;
use crate::io::block_writer::BlockWriter;
use crate::layout::geometry::BLOCK_SIZE;
use crate::layout::inode::Inode;
use crate::traits::allocator::BlockAllocator;
use crate::traits::block_device::BlockDevice;

/// File data writer.
pub struct FileWriter;

impl FileWriter {
    /// Write `data` at byte `offset`, allocating blocks on demand.
    ///
    /// Returns `data.len()` on success. On failure the returned
    /// [`ShortWrite`] carries the length of the prefix that reached the
    /// device; `i_size` already covers that prefix.
    pub fn write<D: BlockDevice, A: BlockAllocator>(
        writer: &mut BlockWriter<D>,
        allocator: &mut A,
        inode: &mut Inode,
        offset: u64,
        data: &[u8],
    ) -> core::result::Result<usize, ShortWrite> {
        if data.is_empty() {
            inode.mark_dirty();
            return Ok(0);
        }
        let end = offset
            .checked_add(data.len() as u64)
            .ok_or(BlockMapError::FileTooLarge)?;

        let mut scratch = vec![0u8; BLOCK_SIZE];
        let mut copied = 0usize;
        let mut current_logical = offset / BLOCK_SIZE as u64;
        let mut offset_in_block = (offset % BLOCK_SIZE as u64) as usize;

        while copied < data.len() {
            let in_this_block = core::cmp::min(BLOCK_SIZE - offset_in_block, data.len() - copied);
            let chunk = &data[copied..copied + in_this_block];

            if let Err(err) = Self::write_chunk(
                writer,
                allocator,
                inode,
                current_logical,
                offset_in_block,
                chunk,
                &mut scratch,
            ) {
                if copied > 0 {
                    Self::grow_size(inode, offset + copied as u64);
                }
                inode.mark_dirty();
                warn!(
                    "ino {}: write at {} stopped after {} of {} bytes: {}",
                    inode.ino,
                    offset,
                    copied,
                    data.len(),
                    err
                );
                return Err(ShortWrite::new(copied, err));
            }

            copied += in_this_block;
            current_logical += 1;
            offset_in_block = 0;
        }

        Self::grow_size(inode, end);
        inode.mark_dirty();
        Ok(copied)
    }

    /// Splice `chunk` into logical block `logical` at `offset_in_block`.
    ///
    /// A block mapped by this call is unmapped again if its write fails.
    fn write_chunk<D: BlockDevice, A: BlockAllocator>(
        writer: &mut BlockWriter<D>,
        allocator: &mut A,
        inode: &mut Inode,
        logical: u64,
        offset_in_block: usize,
        chunk: &[u8],
        scratch: &mut [u8],
    ) -> Result<()> {
        // The mapper leaves the current content (or zeros) in scratch, so a
        // partial block keeps its surrounding bytes.
        let splice = |block: &mut [u8]| {
            block[offset_in_block..offset_in_block + chunk.len()].copy_from_slice(chunk)
        };
        BlockMapper::write_through(writer, allocator, inode, logical, scratch, &splice)?;
        Ok(())
    }

    fn grow_size(inode: &mut Inode, end: u64) {
        if end > inode.i_size {
            debug!("ino {}: size {} -> {}", inode.ino, inode.i_size, end);
            inode.i_size = end;
        }
    }
}

use alloc::vec;

use crate::error::Result;
use crate::fs_core::block_resolver::BlockResolver;
use crate::io::block_reader::BlockReader;
use crate::layout::geometry::BLOCK_SIZE;
use crate::layout::inode::Inode;
use crate::traits::block_device::BlockDevice;

/// File data reader.
///
/// Reads bytes from a file inode by resolving logical blocks through the
/// direct and indirect pointers.
pub struct FileReader;

impl FileReader {
    /// Read file bytes at `offset` into `buf`.
    ///
    /// Returns the number of bytes actually read (EOF-aware). Holes read as
    /// zeros. The first failing block aborts the whole read.
    pub fn read<D: BlockDevice>(
        reader: &BlockReader<D>,
        inode: &Inode,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<usize> {
        if buf.is_empty() || offset >= inode.i_size {
            return Ok(0);
        }

        let file_remaining = inode.i_size - offset;
        let to_read = core::cmp::min(buf.len() as u64, file_remaining) as usize;

        let mut scratch = vec![0u8; BLOCK_SIZE];
        let mut copied = 0usize;
        let mut current_logical = offset / BLOCK_SIZE as u64;
        let mut offset_in_block = (offset % BLOCK_SIZE as u64) as usize;

        while copied < to_read {
            let in_this_block = core::cmp::min(BLOCK_SIZE - offset_in_block, to_read - copied);
            BlockResolver::resolve(reader, inode, current_logical, &mut scratch)?;
            buf[copied..copied + in_this_block]
                .copy_from_slice(&scratch[offset_in_block..offset_in_block + in_this_block]);

            copied += in_this_block;
            current_logical += 1;
            offset_in_block = 0;
        }

        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::FileReader;
    use crate::error::BlockMapError;
    use crate::io::block_reader::BlockReader;
    use crate::layout::geometry::BLOCK_SIZE;
    use crate::layout::inode::Inode;
    use crate::testkit::MemDevice;
    use crate::traits::block_device::BlockDevice;

    fn fixture() -> (MemDevice, Inode) {
        let mut device = MemDevice::new(32);
        device.write_block(4, &vec![b'a'; BLOCK_SIZE]).unwrap();
        device.write_block(5, &vec![b'c'; BLOCK_SIZE]).unwrap();
        let mut inode = Inode::new(2);
        inode.i_block_nr[0] = 4;
        // Block 1 is a hole.
        inode.i_block_nr[2] = 5;
        inode.i_size = 2 * BLOCK_SIZE as u64 + 100;
        (device, inode)
    }

    #[test]
    fn test_read_spans_blocks_and_holes() {
        let (device, inode) = fixture();
        let reader = BlockReader::new(&device);

        let mut buf = vec![0xFFu8; BLOCK_SIZE + 20];
        let n = FileReader::read(&reader, &inode, BLOCK_SIZE as u64 - 10, &mut buf).unwrap();
        assert_eq!(n, BLOCK_SIZE + 20);
        assert_eq!(&buf[..10], &[b'a'; 10]);
        assert!(buf[10..10 + BLOCK_SIZE].iter().all(|&b| b == 0));
        assert_eq!(&buf[10 + BLOCK_SIZE..], &[b'c'; 10]);
    }

    #[test]
    fn test_read_is_clamped_to_file_size() {
        let (device, inode) = fixture();
        let reader = BlockReader::new(&device);

        let mut buf = vec![0u8; 4096];
        let start = 2 * BLOCK_SIZE as u64 + 90;
        assert_eq!(FileReader::read(&reader, &inode, start, &mut buf).unwrap(), 10);
        assert_eq!(FileReader::read(&reader, &inode, inode.i_size, &mut buf).unwrap(), 0);
        assert_eq!(FileReader::read(&reader, &inode, u64::MAX, &mut buf).unwrap(), 0);
        assert_eq!(FileReader::read(&reader, &inode, 0, &mut []).unwrap(), 0);
    }

    #[test]
    fn test_read_fails_on_unreadable_block() {
        let (device, mut inode) = fixture();
        // Points past the end of the device.
        inode.i_block_nr[1] = 1000;
        let reader = BlockReader::new(&device);

        let mut buf = vec![0u8; 2 * BLOCK_SIZE];
        assert_eq!(
            FileReader::read(&reader, &inode, 0, &mut buf),
            Err(BlockMapError::OutOfBounds)
        );
    }
}

use super::geometry::{NR_DIRECT_BLOCKS, POINTER_SIZE};
use super::{read_u32_le, read_u64_le, write_u32_le, write_u64_le};
use crate::error::{BlockMapError, Result};

/// Byte offset of `i_block_nr[0]` inside the inode record.
const BLOCK_NR_OFFSET: usize = 0x08;
const INDIRECT_OFFSET: usize = BLOCK_NR_OFFSET + NR_DIRECT_BLOCKS * POINTER_SIZE;
const DINDIRECT_OFFSET: usize = INDIRECT_OFFSET + POINTER_SIZE;

/// Size of the block-map part of an on-disk inode.
pub const INODE_RECORD_SIZE: usize = DINDIRECT_OFFSET + POINTER_SIZE;

/// In-memory inode as seen by the block map.
///
/// Only the size and pointer fields live here; mode, links and times belong
/// to the inode table that owns the record. The caller holds the inode
/// exclusively for the duration of every read, write or free call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    /// Inode number, used as the owner for block allocation.
    pub ino: u32,
    /// Logical file length in bytes.
    pub i_size: u64,
    /// Direct pointers; `i_block_nr[n]` maps logical block `n`.
    pub i_block_nr: [u32; NR_DIRECT_BLOCKS],
    /// Single-indirect block, 0 when unallocated.
    pub i_indirect: u32,
    /// Double-indirect block, 0 when unallocated.
    pub i_dindirect: u32,
    dirty: bool,
}

impl Inode {
    /// Empty file with no blocks.
    pub fn new(ino: u32) -> Self {
        Self {
            ino,
            i_size: 0,
            i_block_nr: [0; NR_DIRECT_BLOCKS],
            i_indirect: 0,
            i_dindirect: 0,
            dirty: false,
        }
    }

    /// Parse the block-map record of inode `ino`.
    ///
    /// `raw.len()` must be >= `INODE_RECORD_SIZE`. The result starts clean.
    pub fn parse(ino: u32, raw: &[u8]) -> Result<Inode> {
        if raw.len() < INODE_RECORD_SIZE {
            return Err(BlockMapError::CorruptedFs("inode record truncated"));
        }

        let mut i_block_nr = [0u32; NR_DIRECT_BLOCKS];
        for (idx, slot) in i_block_nr.iter_mut().enumerate() {
            *slot = read_u32_le(raw, BLOCK_NR_OFFSET + idx * POINTER_SIZE);
        }

        Ok(Inode {
            ino,
            i_size: read_u64_le(raw, 0x00),
            i_block_nr,
            i_indirect: read_u32_le(raw, INDIRECT_OFFSET),
            i_dindirect: read_u32_le(raw, DINDIRECT_OFFSET),
            dirty: false,
        })
    }

    /// Encode the block-map record into `out[..INODE_RECORD_SIZE]`.
    pub fn serialize(&self, out: &mut [u8]) -> Result<()> {
        if out.len() < INODE_RECORD_SIZE {
            return Err(BlockMapError::CorruptedFs("inode serialize buffer too small"));
        }

        write_u64_le(out, 0x00, self.i_size);
        for (idx, &block_no) in self.i_block_nr.iter().enumerate() {
            write_u32_le(out, BLOCK_NR_OFFSET + idx * POINTER_SIZE, block_no);
        }
        write_u32_le(out, INDIRECT_OFFSET, self.i_indirect);
        write_u32_le(out, DINDIRECT_OFFSET, self.i_dindirect);
        Ok(())
    }

    /// Whether size or pointers changed since the last `clear_dirty`.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Called by the persistence layer once the record is flushed.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Whether no pointer field references a block.
    pub fn has_no_blocks(&self) -> bool {
        self.i_block_nr.iter().all(|&b| b == 0) && self.i_indirect == 0 && self.i_dindirect == 0
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::{INODE_RECORD_SIZE, Inode};
    use crate::layout::geometry::NR_DIRECT_BLOCKS;

    #[test]
    fn test_record_size_follows_direct_count() {
        assert_eq!(INODE_RECORD_SIZE, 8 + 4 * NR_DIRECT_BLOCKS + 8);
    }

    #[test]
    fn test_parse_serialize_round_trip() {
        let mut inode = Inode::new(7);
        inode.i_size = 0x1_0000_0010;
        inode.i_block_nr[0] = 11;
        inode.i_block_nr[NR_DIRECT_BLOCKS - 1] = 12;
        inode.i_indirect = 13;
        inode.i_dindirect = 14;
        inode.mark_dirty();

        let mut raw = vec![0u8; INODE_RECORD_SIZE];
        inode.serialize(&mut raw).unwrap();
        assert_eq!(&raw[0..8], &0x1_0000_0010u64.to_le_bytes());
        assert_eq!(&raw[8..12], &11u32.to_le_bytes());

        let parsed = Inode::parse(7, &raw).unwrap();
        assert!(!parsed.is_dirty());
        assert_eq!(parsed.i_size, inode.i_size);
        assert_eq!(parsed.i_block_nr, inode.i_block_nr);
        assert_eq!(parsed.i_indirect, 13);
        assert_eq!(parsed.i_dindirect, 14);
    }

    #[test]
    fn test_parse_rejects_short_record() {
        assert!(Inode::parse(1, &[0u8; 8]).is_err());
        let inode = Inode::new(1);
        assert!(inode.has_no_blocks());
        assert!(inode.serialize(&mut [0u8; 4]).is_err());
    }
}

use crate::error::{Result, ShortWrite};
use crate::layout::inode::Inode;

/// Filesystem-level statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatFs {
    pub block_size: u64,
    pub total_blocks: u64,
    pub free_blocks: u64,
}

/// High-level filesystem lifecycle operations.
pub trait FileSystem {
    /// Flush written data and pointer blocks to stable storage.
    fn sync(&mut self) -> Result<()>;

    /// Return filesystem statistics (block counts, sizes).
    fn stat_fs(&self) -> Result<StatFs>;
}

/// File data operations exposed to the inode layer.
///
/// The caller owns the inode record: it loads it before the call and
/// persists it afterwards whenever `Inode::is_dirty` reports a change.
pub trait DataOps {
    fn read_data(&self, inode: &Inode, offset: u64, buf: &mut [u8]) -> Result<usize>;

    fn write_data(
        &mut self,
        inode: &mut Inode,
        offset: u64,
        data: &[u8],
    ) -> core::result::Result<usize, ShortWrite>;

    /// Release every block of `inode` and truncate it to zero length.
    fn free_blocks(&mut self, inode: &mut Inode) -> Result<()>;
}

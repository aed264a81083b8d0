use alloc::vec;
use alloc::vec::Vec;

use log::{debug, error, warn};

use crate::error::{BlockMapError, Result};
use crate::fs_core::block_resolver::BlockResolver;
use crate::io::block_writer::BlockWriter;
use crate::layout::geometry::{BLOCK_SIZE, Tier};
use crate::layout::inode::Inode;
use crate::layout::pointer_block::PointerBlock;
use crate::traits::allocator::BlockAllocator;
use crate::traits::block_device::BlockDevice;

/// Edits the content of one block in place before it is persisted.
pub type Splice<'a> = &'a dyn Fn(&mut [u8]);

/// Which pointer references a block allocated during the current call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AllocLevel {
    /// `i_block_nr[n]`
    Direct(usize),
    /// `i_indirect`
    Indirect,
    /// `i_dindirect`
    DoubleIndirect,
    /// Entry `outer` of the double-indirect block.
    DoubleIndirectEntry(usize),
    /// Slot in an indirect block.
    Data,
}

/// Blocks allocated by one mapping call, in allocation order.
///
/// Nothing in here has been made reachable from a persisted pointer block
/// until the call succeeds, so unwinding only has to free the blocks and
/// clear the inode fields that were pointed at them.
struct AllocTransaction {
    fresh: Vec<(AllocLevel, u32)>,
}

impl AllocTransaction {
    fn new() -> Self {
        Self {
            fresh: Vec::with_capacity(3),
        }
    }

    fn alloc<A: BlockAllocator>(
        &mut self,
        allocator: &mut A,
        owner: u32,
        level: AllocLevel,
    ) -> Result<u32> {
        let block_no = allocator.alloc_block(owner)?;
        self.fresh.push((level, block_no));
        Ok(block_no)
    }

    fn is_fresh(&self, level: AllocLevel) -> bool {
        self.fresh.iter().any(|&(l, _)| l == level)
    }

    fn is_empty(&self) -> bool {
        self.fresh.is_empty()
    }

    /// Free every recorded block, newest first, and reset inode pointers.
    fn rollback<A: BlockAllocator>(self, allocator: &mut A, inode: &mut Inode) {
        for (level, block_no) in self.fresh.into_iter().rev() {
            if let Err(err) = allocator.free_block(inode.ino, block_no) {
                error!(
                    "ino {}: failed to release {:?} block {} during rollback: {}",
                    inode.ino, level, block_no, err
                );
            }
            match level {
                AllocLevel::Direct(idx) => inode.i_block_nr[idx] = 0,
                AllocLevel::Indirect => inode.i_indirect = 0,
                AllocLevel::DoubleIndirect => inode.i_dindirect = 0,
                // Only referenced from in-memory tables that are dropped.
                AllocLevel::DoubleIndirectEntry(_) | AllocLevel::Data => {}
            }
        }
    }
}

/// On-demand block allocation for the write path.
pub struct BlockMapper;

impl BlockMapper {
    /// Return the physical block backing `logical`, allocating it and every
    /// missing pointer block on the way.
    ///
    /// An already mapped block is returned unchanged. On return `scratch`
    /// holds the current block content, or zeros for a fresh block. On error
    /// every block allocated by this call has been released again and no
    /// persisted pointer references one of them.
    pub fn ensure_allocated<D: BlockDevice, A: BlockAllocator>(
        writer: &mut BlockWriter<D>,
        allocator: &mut A,
        inode: &mut Inode,
        logical: u64,
        scratch: &mut [u8],
    ) -> Result<u32> {
        Self::map(writer, allocator, inode, logical, scratch, None)
    }

    /// Like [`ensure_allocated`](Self::ensure_allocated), then apply
    /// `splice` to the block content in `scratch` and write it back.
    ///
    /// A fresh data block is written before any pointer to it is persisted,
    /// and a failed data write unwinds the fresh mapping like a failed
    /// allocation does.
    pub fn write_through<D: BlockDevice, A: BlockAllocator>(
        writer: &mut BlockWriter<D>,
        allocator: &mut A,
        inode: &mut Inode,
        logical: u64,
        scratch: &mut [u8],
        splice: Splice<'_>,
    ) -> Result<u32> {
        Self::map(writer, allocator, inode, logical, scratch, Some(splice))
    }

    fn map<D: BlockDevice, A: BlockAllocator>(
        writer: &mut BlockWriter<D>,
        allocator: &mut A,
        inode: &mut Inode,
        logical: u64,
        scratch: &mut [u8],
        splice: Option<Splice<'_>>,
    ) -> Result<u32> {
        let existing = BlockResolver::resolve(&writer.as_reader(), inode, logical, scratch)?;
        if existing != 0 {
            Self::fill(writer, existing, scratch, splice)?;
            return Ok(existing);
        }

        let block_no = match Tier::locate(logical)? {
            Tier::Direct(idx) => {
                Self::alloc_direct(writer, allocator, inode, idx, scratch, splice)?
            }
            Tier::Indirect(idx) => {
                Self::alloc_indirect(writer, allocator, inode, idx, scratch, splice)?
            }
            Tier::DoubleIndirect { outer, inner } => Self::alloc_double_indirect(
                writer, allocator, inode, outer, inner, scratch, splice,
            )?,
        };
        debug!(
            "ino {}: mapped logical block {} to block {}",
            inode.ino, logical, block_no
        );
        Ok(block_no)
    }

    fn fill<D: BlockDevice>(
        writer: &mut BlockWriter<D>,
        block_no: u32,
        scratch: &mut [u8],
        splice: Option<Splice<'_>>,
    ) -> Result<()> {
        match splice {
            Some(splice) => {
                splice(scratch);
                writer.write_block(block_no as u64, scratch)
            }
            None => Ok(()),
        }
    }

    fn alloc_direct<D: BlockDevice, A: BlockAllocator>(
        writer: &mut BlockWriter<D>,
        allocator: &mut A,
        inode: &mut Inode,
        idx: usize,
        scratch: &mut [u8],
        splice: Option<Splice<'_>>,
    ) -> Result<u32> {
        let owner = inode.ino;
        let mut txn = AllocTransaction::new();

        let result = (|| -> Result<u32> {
            if inode.i_block_nr[idx] != 0 {
                return Err(BlockMapError::CorruptedFs("direct slot already mapped"));
            }
            let data = txn.alloc(allocator, owner, AllocLevel::Direct(idx))?;
            Self::fill(writer, data, scratch, splice)?;
            inode.i_block_nr[idx] = data;
            Ok(data)
        })();

        Self::finish(txn, allocator, inode, result)
    }

    fn alloc_indirect<D: BlockDevice, A: BlockAllocator>(
        writer: &mut BlockWriter<D>,
        allocator: &mut A,
        inode: &mut Inode,
        idx: usize,
        scratch: &mut [u8],
        splice: Option<Splice<'_>>,
    ) -> Result<u32> {
        let owner = inode.ino;
        let mut table_buf = vec![0u8; BLOCK_SIZE];
        let mut txn = AllocTransaction::new();

        let result = (|| -> Result<u32> {
            let mut table = if inode.i_indirect == 0 {
                inode.i_indirect = txn.alloc(allocator, owner, AllocLevel::Indirect)?;
                PointerBlock::zeroed()
            } else {
                writer
                    .as_reader()
                    .read_pointer_block(inode.i_indirect, &mut table_buf)?
            };
            if table.get(idx)? != 0 {
                return Err(BlockMapError::CorruptedFs("indirect slot already mapped"));
            }

            let data = txn.alloc(allocator, owner, AllocLevel::Data)?;
            Self::fill(writer, data, scratch, splice)?;
            table.set(idx, data)?;
            writer.write_pointer_block(inode.i_indirect, &table)?;
            Ok(data)
        })();

        Self::finish(txn, allocator, inode, result)
    }

    #[allow(clippy::too_many_arguments)]
    fn alloc_double_indirect<D: BlockDevice, A: BlockAllocator>(
        writer: &mut BlockWriter<D>,
        allocator: &mut A,
        inode: &mut Inode,
        outer: usize,
        inner: usize,
        scratch: &mut [u8],
        splice: Option<Splice<'_>>,
    ) -> Result<u32> {
        let owner = inode.ino;
        let mut table_buf = vec![0u8; BLOCK_SIZE];
        let mut txn = AllocTransaction::new();

        let result = (|| -> Result<u32> {
            let mut dtable = if inode.i_dindirect == 0 {
                inode.i_dindirect = txn.alloc(allocator, owner, AllocLevel::DoubleIndirect)?;
                PointerBlock::zeroed()
            } else {
                writer
                    .as_reader()
                    .read_pointer_block(inode.i_dindirect, &mut table_buf)?
            };

            let mut indirect = dtable.get(outer)?;
            let mut table = if indirect == 0 {
                indirect = txn.alloc(allocator, owner, AllocLevel::DoubleIndirectEntry(outer))?;
                dtable.set(outer, indirect)?;
                PointerBlock::zeroed()
            } else {
                writer
                    .as_reader()
                    .read_pointer_block(indirect, &mut table_buf)?
            };
            if table.get(inner)? != 0 {
                return Err(BlockMapError::CorruptedFs("indirect slot already mapped"));
            }

            let data = txn.alloc(allocator, owner, AllocLevel::Data)?;
            Self::fill(writer, data, scratch, splice)?;
            table.set(inner, data)?;

            // Innermost first: the indirect block must be on disk before the
            // double-indirect block points at it.
            writer.write_pointer_block(indirect, &table)?;
            if txn.is_fresh(AllocLevel::DoubleIndirectEntry(outer)) {
                writer.write_pointer_block(inode.i_dindirect, &dtable)?;
            }
            Ok(data)
        })();

        Self::finish(txn, allocator, inode, result)
    }

    fn finish<A: BlockAllocator>(
        txn: AllocTransaction,
        allocator: &mut A,
        inode: &mut Inode,
        result: Result<u32>,
    ) -> Result<u32> {
        match result {
            Ok(block_no) => {
                inode.mark_dirty();
                Ok(block_no)
            }
            Err(err) => {
                if !txn.is_empty() {
                    warn!(
                        "ino {}: rolling back {} freshly allocated block(s): {}",
                        inode.ino,
                        txn.fresh.len(),
                        err
                    );
                    txn.rollback(allocator, inode);
                }
                Err(err)
            }
        }
    }
}

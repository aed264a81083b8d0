//! In-memory collaborators for unit and scenario tests.

use std::cell::Cell;
use std::collections::BTreeMap;

use crate::error::{BlockMapError, Result};
use crate::fs_alloc::block_alloc::BitmapBlockAllocator;
use crate::layout::geometry::BLOCK_SIZE;
use crate::traits::allocator::BlockAllocator;
use crate::traits::block_device::BlockDevice;

/// Install `env_logger` once; `RUST_LOG=debug` shows engine logs.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Sparse memory-backed block device.
///
/// Unwritten blocks read as zeros. Reads and writes are counted, and writes
/// to one chosen block can be made to fail.
pub struct MemDevice {
    blocks: BTreeMap<u64, Vec<u8>>,
    total_blocks: u64,
    block_size: usize,
    reads: Cell<usize>,
    writes: usize,
    flushes: usize,
    fail_writes_to: Option<u64>,
}

impl MemDevice {
    pub fn new(total_blocks: u64) -> Self {
        Self::with_block_size(total_blocks, BLOCK_SIZE)
    }

    pub fn with_block_size(total_blocks: u64, block_size: usize) -> Self {
        init_logger();
        Self {
            blocks: BTreeMap::new(),
            total_blocks,
            block_size,
            reads: Cell::new(0),
            writes: 0,
            flushes: 0,
            fail_writes_to: None,
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Make every write to `block_no` fail with `IoError`.
    pub fn fail_writes_to(&mut self, block_no: Option<u64>) {
        self.fail_writes_to = block_no;
    }

    /// Current content of a block, `None` if never written.
    pub fn block(&self, block_no: u64) -> Option<&[u8]> {
        self.blocks.get(&block_no).map(Vec::as_slice)
    }

    fn check(&self, block_no: u64, len: usize) -> Result<()> {
        if block_no >= self.total_blocks {
            return Err(BlockMapError::OutOfBounds);
        }
        if len != self.block_size {
            return Err(BlockMapError::IoError);
        }
        Ok(())
    }
}

impl BlockDevice for MemDevice {
    fn read_block(&self, block_no: u64, buf: &mut [u8]) -> Result<()> {
        self.check(block_no, buf.len())?;
        self.reads.set(self.reads.get() + 1);
        match self.blocks.get(&block_no) {
            Some(data) => buf.copy_from_slice(data),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_block(&mut self, block_no: u64, buf: &[u8]) -> Result<()> {
        self.check(block_no, buf.len())?;
        if self.fail_writes_to == Some(block_no) {
            return Err(BlockMapError::IoError);
        }
        self.writes += 1;
        self.blocks.insert(block_no, buf.to_vec());
        Ok(())
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn total_blocks(&self) -> u64 {
        self.total_blocks
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

/// Bitmap allocator wrapper keeping per-block reference counts.
///
/// `allocs[b]` and `frees[b]` count how often block `b` was handed out and
/// returned. Allocation can be cut off after a given number of further calls.
pub struct CountingAllocator {
    inner: BitmapBlockAllocator,
    alloc_calls: usize,
    allocs: BTreeMap<u32, usize>,
    frees: BTreeMap<u32, usize>,
    budget: Option<usize>,
}

impl CountingAllocator {
    pub fn new(total_blocks: u32) -> Self {
        Self {
            inner: BitmapBlockAllocator::new(total_blocks, 1),
            alloc_calls: 0,
            allocs: BTreeMap::new(),
            frees: BTreeMap::new(),
            budget: None,
        }
    }

    /// Allow `n` more successful allocations, then fail with `NoSpace`.
    pub fn exhaust_after(&mut self, n: usize) {
        self.budget = Some(n);
    }

    /// Calls to `alloc_block`, failed ones included.
    pub fn alloc_calls(&self) -> usize {
        self.alloc_calls
    }

    /// Blocks currently allocated through this wrapper.
    pub fn outstanding(&self) -> usize {
        let allocated: usize = self.allocs.values().sum();
        let freed: usize = self.frees.values().sum();
        allocated - freed
    }

    /// Every allocated block was freed exactly as often as it was handed out.
    pub fn balanced(&self) -> bool {
        self.allocs.len() == self.frees.len()
            && self
                .allocs
                .iter()
                .all(|(block, count)| self.frees.get(block) == Some(count))
    }

    pub fn peek_next_free(&self) -> Option<u32> {
        self.inner.peek_next_free()
    }

    pub fn owner_of(&self, block_no: u32) -> Option<u32> {
        self.inner.owner_of(block_no)
    }
}

impl BlockAllocator for CountingAllocator {
    fn alloc_block(&mut self, owner: u32) -> Result<u32> {
        self.alloc_calls += 1;
        if let Some(budget) = self.budget.as_mut() {
            if *budget == 0 {
                return Err(BlockMapError::NoSpace);
            }
            *budget -= 1;
        }
        let block_no = self.inner.alloc_block(owner)?;
        *self.allocs.entry(block_no).or_default() += 1;
        Ok(block_no)
    }

    fn free_block(&mut self, owner: u32, block_no: u32) -> Result<()> {
        self.inner.free_block(owner, block_no)?;
        *self.frees.entry(block_no).or_default() += 1;
        Ok(())
    }

    fn free_block_count(&self) -> u64 {
        self.inner.free_block_count()
    }
}

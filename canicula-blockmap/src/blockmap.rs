#![cfg_attr(not(test), no_std)]

//! Logical-to-physical block mapping for file data.
//!
//! Each inode maps its logical blocks through `NR_DIRECT_BLOCKS` direct
//! pointers, one single-indirect block and one double-indirect block. Reads
//! treat unmapped blocks as zeros, writes allocate on demand and unwind
//! partial allocations, and freeing returns everything an inode holds to the
//! allocator. [`BlockMapFs`] wires the pieces to one device and allocator.

extern crate alloc;

pub mod error;
pub mod fs;
pub mod io;
pub mod layout;
pub mod traits;

// `core/` and `alloc/` would shadow the `core` and `alloc` crates, so the
// directories are mounted under different module names.
#[path = "core/mod.rs"]
pub mod fs_core;

#[path = "alloc/mod.rs"]
pub mod fs_alloc;

#[cfg(test)]
mod testkit;

#[cfg(test)]
mod tests;

// Re-exports
pub use error::{BlockMapError, Result, ShortWrite};
pub use fs::BlockMapFs;
pub use fs_alloc::bitmap::Bitmap;
pub use fs_alloc::block_alloc::BitmapBlockAllocator;
pub use fs_core::block_mapper::BlockMapper;
pub use fs_core::block_reclaimer::BlockReclaimer;
pub use fs_core::block_resolver::BlockResolver;
pub use fs_core::file_reader::FileReader;
pub use fs_core::file_writer::FileWriter;
pub use io::block_reader::BlockReader;
pub use io::block_writer::BlockWriter;
pub use layout::geometry::{
    BLOCK_SIZE, DINDIRECT_START, INDIRECT_START, MAX_FILE_SIZE, MAX_LOGICAL_BLOCKS,
    NR_DINDIRECT_BLOCKS, NR_DIRECT_BLOCKS, NR_INDIRECT_BLOCKS, POINTER_SIZE, Tier,
};
pub use layout::inode::{INODE_RECORD_SIZE, Inode};
pub use layout::pointer_block::PointerBlock;
pub use traits::allocator::BlockAllocator;
pub use traits::block_device::BlockDevice;
pub use traits::vfs::{DataOps, FileSystem, StatFs};

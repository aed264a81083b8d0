pub mod allocator;
pub mod block_device;
pub mod vfs;

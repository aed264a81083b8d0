pub mod bitmap;
pub mod block_alloc;

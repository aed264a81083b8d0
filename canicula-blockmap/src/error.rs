use thiserror::Error;

/// Unified error type for canicula-blockmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BlockMapError {
    /// I/O error from the block device
    #[error("block device I/O error")]
    IoError,
    /// Access past the end of the block device
    #[error("block access out of device bounds")]
    OutOfBounds,
    /// Logical block lies beyond the double-indirect tier
    #[error("file too large")]
    FileTooLarge,
    /// The free-block allocator has nothing left to hand out
    #[error("no free blocks available")]
    NoSpace,
    /// Read-only device or filesystem
    #[error("read-only filesystem")]
    ReadOnly,
    /// Inconsistent mapping or allocator metadata
    #[error("corrupted filesystem: {0}")]
    CorruptedFs(&'static str),
    /// Device block size does not match the compiled layout
    #[error("device block size {found} does not match layout block size {expected}")]
    BlockSizeMismatch { expected: usize, found: usize },
}

/// A write that stopped partway.
///
/// `written` bytes starting at the requested offset reached the device and are
/// covered by the inode size; nothing after them was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{error} after {written} bytes written")]
pub struct ShortWrite {
    pub written: usize,
    #[source]
    pub error: BlockMapError,
}

impl ShortWrite {
    pub fn new(written: usize, error: BlockMapError) -> Self {
        Self { written, error }
    }

    /// Whether any prefix of the request was written.
    pub fn is_partial(&self) -> bool {
        self.written > 0
    }
}

impl From<BlockMapError> for ShortWrite {
    fn from(error: BlockMapError) -> Self {
        Self::new(0, error)
    }
}

/// Convenience Result type alias.
pub type Result<T> = ::core::result::Result<T, BlockMapError>;

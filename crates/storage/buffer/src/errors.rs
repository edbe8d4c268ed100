//! Errors produced by the buffer pool.

use file::errors::DiskError;
use page::PageId;
use thiserror::Error;

/// Errors produced by [`crate::pool::BufferPool`] operations.
#[derive(Debug, Error)]
pub enum BufferError {
    /// The page is pinned and cannot be evicted or deleted.
    #[error("page {0} is pinned and cannot be evicted or deleted")]
    Pinned(PageId),
    /// Every frame is pinned; there was nothing left to evict.
    #[error("buffer pool is full: no unpinned frame available for eviction")]
    PoolExhausted,
    /// The page was not found in the pool's page table.
    #[error("page {0} is not resident in the buffer pool")]
    NotResident(PageId),
    /// Propagated error from the underlying disk manager.
    #[error(transparent)]
    Disk(#[from] DiskError),
}

/// Convenience alias for results returned by this crate.
pub type BufferResult<T> = Result<T, BufferError>;

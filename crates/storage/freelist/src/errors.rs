//! Errors produced by the free-list chain.

use page::errors::PageError;
use thiserror::Error;

/// Errors produced while pushing onto or popping from the on-disk free-list
/// chain.
#[derive(Debug, Error)]
pub enum FreeListError {
    /// A free-list page's entry array is full; the caller must repurpose the
    /// freed page as a new head before retrying.
    #[error("free-list page is full ({capacity} entries)")]
    PageFull {
        /// Maximum number of entries a free-list page can hold.
        capacity: u32,
    },
    /// Popped or inspected an entry array that turned out to be empty.
    #[error("free-list page has no entries")]
    PageEmpty,
    /// Propagated error from the underlying page layer.
    #[error(transparent)]
    Page(#[from] PageError),
    /// Propagated error from the page-I/O backend (disk read/write failure).
    #[error("free-list page I/O failed: {0}")]
    Io(String),
}

/// Convenience alias for results returned by this crate.
pub type FreeListResult<T> = Result<T, FreeListError>;

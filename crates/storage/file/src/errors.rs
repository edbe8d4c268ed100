//! Errors produced by disk-manager operations.

use binary_helpers::bin_error::BinaryError;
use freelist::FreeListError;
use page::errors::PageError;
use thiserror::Error;

/// Errors produced by a [`crate::manager::DiskManager`] implementation.
#[derive(Debug, Error)]
pub enum DiskError {
    /// The requested page id has never been allocated.
    #[error("page {id} has not been allocated (next id is {next})")]
    InvalidPageId {
        /// The offending page id.
        id: u32,
        /// The manager's current next-page-identifier counter.
        next: u32,
    },
    /// Propagated error from the free-list chain.
    #[error(transparent)]
    FreeList(#[from] FreeListError),
    /// Propagated error from the page layer (header/slot decoding).
    #[error(transparent)]
    Page(#[from] PageError),
    /// Propagated little-endian read/write error (e.g. decoding the
    /// free-list sidecar).
    #[error(transparent)]
    Binary(#[from] BinaryError),
    /// Propagated filesystem error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A page or envelope failed a decode or integrity check below the
    /// disk-manager layer (codec corruption, bad compression/encryption
    /// framing).
    #[error("corrupt page data: {0}")]
    Corruption(String),
}

/// Convenience alias for results returned by this crate.
pub type DiskResult<T> = Result<T, DiskError>;

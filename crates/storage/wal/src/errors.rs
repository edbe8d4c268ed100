//! Errors produced by the write-ahead log.

use binary_helpers::bin_error::BinaryError;
use thiserror::Error;

/// Errors produced by [`crate::wal::Wal`] operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// Propagated filesystem error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A record's header or type tag failed to decode.
    #[error("corrupt wal record: {0}")]
    Corruption(String),
    /// Propagated little-endian decode error.
    #[error(transparent)]
    Binary(#[from] BinaryError),
}

/// Convenience alias for results returned by this crate.
pub type WalResult<T> = Result<T, WalError>;

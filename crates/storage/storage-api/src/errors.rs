//! Errors produced by the storage engine orchestrator.

use crate::config::ConfigError;
use buffer::BufferError;
use codec::CodecError;
use file::errors::DiskError;
use thiserror::Error;
use wal::WalError;

/// Errors produced by [`crate::engine::StorageEngine`] operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Propagated error from the buffer pool.
    #[error(transparent)]
    Buffer(#[from] BufferError),
    /// Propagated error from a disk manager.
    #[error(transparent)]
    Disk(#[from] DiskError),
    /// Propagated error from the write-ahead log.
    #[error(transparent)]
    Wal(#[from] WalError),
    /// Propagated error from the codec layer.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Propagated error loading or validating configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// An operation was attempted on an engine that has already been closed.
    #[error("storage engine is closed")]
    Closed,
}

/// Convenience alias for results returned by this crate.
pub type EngineResult<T> = Result<T, EngineError>;

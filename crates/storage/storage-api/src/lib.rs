//! Orchestrates a disk manager, buffer pool, and write-ahead log into a
//! single storage engine: config loading, crash recovery, checkpointing,
//! and a pinned-page API for the layers above.

#![forbid(unsafe_code)]

/// TOML-backed engine configuration.
pub mod config;
/// Tagged-enum disk-manager and WAL backends.
pub mod disk_backend;
/// The storage engine itself.
pub mod engine;
/// Errors produced by this crate.
pub mod errors;

pub use config::{CodecConfig, CompressionConfig, DiskManagerKind, EncryptionConfig, EngineConfig, StorageConfig};
pub use disk_backend::{AnyDiskManager, AnyWal};
pub use engine::StorageEngine;
pub use errors::{EngineError, EngineResult};

//! # laura-storage
//!
//! This is the umbrella crate for the LauraDB storage engine workspace.
//!
//! The engine is composed of multiple internal components organized under
//! the `/crates/storage` directory of this workspace:
//!
//! - `binary-helpers`: little-endian (de)serialization primitives.
//! - `page`: fixed-size pages and the slotted-page record layout.
//! - `freelist`: on-disk chain of reclaimable page identifiers.
//! - `file`: disk managers (positional I/O and memory-mapped).
//! - `buffer`: LRU buffer pool with pin/dirty discipline.
//! - `wal`: write-ahead log, append/replay/checkpoint.
//! - `codec`: page- and WAL-level compression and encryption wrappers.
//! - `storage-api`: the `StorageEngine` orchestrator.
//!
//! This crate re-exports `storage-api` as the single entry point consumers
//! of the engine should depend on.

pub use storage_api::*;

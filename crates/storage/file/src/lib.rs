//! Authoritative page I/O: allocation, the on-disk free-list chain, raw
//! page read/write, and fragmentation-driven compaction sweeps.
//!
//! Two implementations share one [`manager::DiskManager`] contract: a
//! positional-I/O variant ([`positional::PositionalDiskManager`]) and a
//! memory-mapped variant ([`mapped::MappedDiskManager`]). Neither decodes
//! or encodes page contents beyond the fixed header/slotted-page layout —
//! compression and encryption live one layer up, in the codec crate.

/// Errors produced by disk-manager operations.
pub mod errors;
/// The `DiskManager` trait and its supporting statistics/hint types.
pub mod manager;
/// Free-list head persistence (sidecar file). The allocation counter is
/// never persisted: it is always reconstructed from the data file's size.
pub mod metadata;
/// Positional (`pread`/`pwrite`) whole-page I/O helpers.
pub mod raw_io;
/// The positional-I/O disk manager.
pub mod positional;
/// The memory-mapped disk manager. Carries the workspace's sole
/// `#![allow(unsafe_code)]` exception.
pub mod mapped;

pub use errors::{DiskError, DiskResult};
pub use manager::{AccessHint, CompactionStats, DiskManager, DiskStats};
pub use mapped::MappedDiskManager;
pub use metadata::{load_free_list, sidecar_path, store_free_list};
pub use positional::PositionalDiskManager;

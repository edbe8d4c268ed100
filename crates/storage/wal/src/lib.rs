//! The write-ahead log: an append-only, crash-tolerant record stream used
//! to redo page mutations during recovery.

#![forbid(unsafe_code)]

/// Errors produced by this crate.
pub mod errors;
/// The on-disk record format.
pub mod record;
/// The append/flush/replay/checkpoint/close log file.
pub mod wal;

pub use errors::{WalError, WalResult};
pub use record::{WalRecord, WalRecordType, WAL_HEADER_SIZE};
pub use wal::Wal;

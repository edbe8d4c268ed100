//! Transparent compression and encryption for pages and write-ahead log
//! records.
//!
//! Two wrappers live here: [`page_codec::PageCodec`], which conforms to
//! [`file::manager::DiskManager`] and transforms a page's payload, and
//! [`wal_codec::WalCodec`], which conforms to the write-ahead log's
//! append/replay surface and transforms only a record's `data` field.
//! Both write a tagged envelope even when disabled, so a database opened
//! once without a codec can be reopened later with one turned on.

#![forbid(unsafe_code)]

/// Compression algorithms and their envelope format.
pub mod compression;
/// Encryption algorithms and their envelope format.
pub mod encryption;
/// Errors produced by this crate.
pub mod errors;
/// Password-based key derivation.
pub mod key;
/// The page-level codec wrapper.
pub mod page_codec;
/// The write-ahead-log codec wrapper.
pub mod wal_codec;

pub use compression::CompressionAlgorithm;
pub use encryption::{EncryptionAlgorithm, EncryptionKey};
pub use errors::{CodecError, CodecResult};
pub use page_codec::{PageCodec, PageCodecConfig};
pub use wal_codec::{WalCodec, WalCodecConfig};

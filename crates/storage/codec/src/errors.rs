//! Errors produced by the compression/encryption codec layer.

use file::errors::DiskError;
use thiserror::Error;
use wal::WalError;

/// Errors produced by [`crate::page_codec::PageCodec`] and
/// [`crate::wal_codec::WalCodec`].
#[derive(Debug, Error)]
pub enum CodecError {
    /// An envelope's stored algorithm tag did not match the configured
    /// algorithm (and was not the disabled sentinel).
    #[error("codec algorithm mismatch: envelope tagged {found}, configured for {expected}")]
    AlgorithmMismatch {
        /// The algorithm tag the caller is configured to expect.
        expected: u8,
        /// The algorithm tag actually found in the envelope.
        found: u8,
    },
    /// An envelope failed a size or integrity check (short buffer,
    /// decompression failure, AEAD authentication failure).
    #[error("codec envelope corruption: {0}")]
    Corruption(String),
    /// Encryption is configured but no key was supplied.
    #[error("encryption algorithm configured without a key")]
    MissingKey,
    /// The encoded envelope does not fit in the space available (a page
    /// payload, typically).
    #[error("encoded envelope needs {needed} bytes but only {capacity} are available")]
    EnvelopeTooLarge {
        /// Bytes the envelope actually needs.
        needed: usize,
        /// Bytes available to hold it.
        capacity: usize,
    },
    /// Propagated filesystem error (e.g. reading/writing a salt file).
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Propagated error from the wrapped write-ahead log.
    #[error(transparent)]
    Wal(#[from] WalError),
}

/// Convenience alias for results returned by this crate.
pub type CodecResult<T> = Result<T, CodecError>;

impl From<CodecError> for DiskError {
    fn from(value: CodecError) -> Self {
        match value {
            CodecError::AlgorithmMismatch { expected, found } => DiskError::Corruption(
                format!("codec algorithm mismatch: envelope tagged {found}, configured for {expected}"),
            ),
            CodecError::Corruption(message) => {
                DiskError::Corruption(format!("codec corruption: {message}"))
            }
            CodecError::MissingKey => {
                DiskError::Corruption("encryption configured without a key".to_string())
            }
            CodecError::EnvelopeTooLarge { needed, capacity } => DiskError::Corruption(
                format!("codec envelope needs {needed} bytes but only {capacity} are available"),
            ),
            CodecError::Io(e) => DiskError::Io(e),
            CodecError::Wal(e) => DiskError::Corruption(e.to_string()),
        }
    }
}

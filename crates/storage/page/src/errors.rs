use binary_helpers::bin_error::BinaryError;
use thiserror::Error;

/// Errors produced by page and slotted-page operations.
#[derive(Debug, Error)]
pub enum PageError {
    /// A malformed argument was supplied: an out-of-range slot id, an
    /// unrecognized page-type tag, or similar caller error.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A slot id was out of range for the page's slot count.
    #[error("slot {slot_id} is out of range (slot count {slot_count})")]
    OutOfRange {
        /// The offending slot id.
        slot_id: u32,
        /// The page's current slot count.
        slot_count: u16,
    },

    /// There was insufficient contiguous free space for the requested
    /// insert or relocated update, even after compaction.
    #[error("insufficient space: need {needed} bytes, {available} available")]
    OutOfSpace {
        /// Bytes required by the operation.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// The page's on-disk bytes failed to decode.
    #[error("page corruption: {0}")]
    Corruption(String),

    /// The slot has already been deleted.
    #[error("slot {0} is already deleted")]
    AlreadyDeleted(u32),

    /// Error reading/writing a little-endian field.
    #[error(transparent)]
    Binary(#[from] BinaryError),
}

/// Result alias for page/slotted-page operations.
pub type PageResult<T> = Result<T, PageError>;

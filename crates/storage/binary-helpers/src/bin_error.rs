use std::array::TryFromSliceError;
use thiserror::Error;

/// Errors produced while reading or writing little-endian integers from/to byte slices.
#[derive(Error, Debug)]
pub enum BinaryError {
    /// The requested range does not fit inside the provided slice.
    #[error("attempt to read {expected} bytes from offset {from_offset}, but the slice does not contain that range")]
    BytesSliceSizeMismatch { expected: usize, from_offset: usize },
    /// A fixed-size array conversion from a slice failed.
    #[error("error converting a slice")]
    SliceConversionError(#[from] TryFromSliceError),
    /// Source and target buffers were of mismatched size on write.
    #[error("size mismatch while writing: source {src} vs target {target}")]
    WriteErrorSliceSizeMismatch { src: usize, target: usize },
}

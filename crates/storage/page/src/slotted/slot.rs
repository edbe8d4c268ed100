//! A single 5-byte slot-directory entry: `offset:u16, length:u16, flags:u8`.

use crate::errors::PageError;
use binary_helpers::bin_error::BinaryError;
use binary_helpers::le::{read_le, write_le};
use thiserror::Error;

/// Size of a slot-directory entry, in bytes.
pub const SLOT_SIZE: usize = 5;

/// Error produced while constructing a zero-copy slot view.
#[derive(Debug, Error)]
pub enum SlotError {
    /// The provided byte range was not exactly [`SLOT_SIZE`] long.
    #[error("slot bytes must be {SLOT_SIZE} long, got {actual}")]
    SizeMismatch {
        /// Actual slice length observed.
        actual: usize,
    },
    /// Propagated little-endian read/write error.
    #[error(transparent)]
    Binary(#[from] BinaryError),
}

impl From<SlotError> for PageError {
    fn from(e: SlotError) -> Self {
        PageError::Corruption(e.to_string())
    }
}

/// Bitflags carried in a slot's single flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotFlags(u8);

impl SlotFlags {
    const DELETED: u8 = 1 << 0;
    const OVERFLOW: u8 = 1 << 1;
    const UPDATED: u8 = 1 << 2;

    /// Wraps a raw flags byte.
    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// The raw flags byte.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Whether the `Deleted` bit is set.
    pub fn deleted(self) -> bool {
        self.0 & Self::DELETED != 0
    }

    /// Whether the `Overflow` bit is set.
    pub fn overflow(self) -> bool {
        self.0 & Self::OVERFLOW != 0
    }

    /// Whether the `Updated` bit is set.
    pub fn updated(self) -> bool {
        self.0 & Self::UPDATED != 0
    }

    /// Returns a copy with `Deleted` set.
    pub fn with_deleted(self) -> Self {
        Self(self.0 | Self::DELETED)
    }

    /// Returns a copy with `Updated` set.
    pub fn with_updated(self) -> Self {
        Self(self.0 | Self::UPDATED)
    }

    /// Returns a copy with `Overflow` set.
    pub fn with_overflow(self) -> Self {
        Self(self.0 | Self::OVERFLOW)
    }
}

/// Zero-copy immutable view into a single slot-directory entry.
#[derive(Debug)]
pub struct SlotRef<'a> {
    slot_id: u32,
    bytes: &'a [u8; SLOT_SIZE],
}

impl<'a> SlotRef<'a> {
    pub(super) fn from_raw(slot_id: u32, bytes: &'a [u8]) -> Result<Self, SlotError> {
        if bytes.len() != SLOT_SIZE {
            return Err(SlotError::SizeMismatch { actual: bytes.len() });
        }
        Ok(Self {
            slot_id,
            bytes: bytes.try_into().expect("length checked above"),
        })
    }

    /// The logical slot id this view was constructed for.
    pub fn slot_id(&self) -> u32 {
        self.slot_id
    }

    /// Offset into the payload where this slot's record starts (0 if deleted).
    pub fn offset(&self) -> Result<u16, SlotError> {
        Ok(read_le::<u16>(self.bytes, 0)?)
    }

    /// Length of this slot's record, in bytes.
    pub fn length(&self) -> Result<u16, SlotError> {
        Ok(read_le::<u16>(self.bytes, 2)?)
    }

    /// Raw flags byte.
    pub fn flags(&self) -> Result<u8, SlotError> {
        Ok(read_le::<u8>(self.bytes, 4)?)
    }
}

/// Zero-copy mutable view into a single slot-directory entry.
#[derive(Debug)]
pub struct SlotMut<'a> {
    slot_id: u32,
    bytes: &'a mut [u8; SLOT_SIZE],
}

impl<'a> SlotMut<'a> {
    pub(super) fn from_raw(slot_id: u32, bytes: &'a mut [u8]) -> Result<Self, SlotError> {
        if bytes.len() != SLOT_SIZE {
            return Err(SlotError::SizeMismatch { actual: bytes.len() });
        }
        Ok(Self {
            slot_id,
            bytes: bytes.try_into().expect("length checked above"),
        })
    }

    /// Offset into the payload where this slot's record starts.
    pub fn offset(&self) -> Result<u16, SlotError> {
        Ok(read_le::<u16>(self.bytes, 0)?)
    }

    /// Length of this slot's record, in bytes.
    pub fn length(&self) -> Result<u16, SlotError> {
        Ok(read_le::<u16>(self.bytes, 2)?)
    }

    /// Raw flags byte.
    pub fn flags(&self) -> Result<u8, SlotError> {
        Ok(read_le::<u8>(self.bytes, 4)?)
    }

    /// Writes the offset field.
    pub fn set_offset(&mut self, offset: u16) -> Result<(), SlotError> {
        Ok(write_le::<u16>(self.bytes, 0, offset)?)
    }

    /// Writes the length field.
    pub fn set_length(&mut self, length: u16) -> Result<(), SlotError> {
        Ok(write_le::<u16>(self.bytes, 2, length)?)
    }

    /// Writes the flags byte.
    pub fn set_flags(&mut self, flags: u8) -> Result<(), SlotError> {
        Ok(write_le::<u8>(self.bytes, 4, flags)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_round_trip() {
        let mut bytes = [0u8; SLOT_SIZE];
        {
            let mut s = SlotMut::from_raw(2, &mut bytes).unwrap();
            s.set_offset(100).unwrap();
            s.set_length(42).unwrap();
            s.set_flags(SlotFlags::from_bits(0).with_deleted().bits())
                .unwrap();
        }
        let s = SlotRef::from_raw(2, &bytes).unwrap();
        assert_eq!(s.offset().unwrap(), 100);
        assert_eq!(s.length().unwrap(), 42);
        assert!(SlotFlags::from_bits(s.flags().unwrap()).deleted());
    }

    #[test]
    fn rejects_wrong_size() {
        let bytes = [0u8; SLOT_SIZE - 1];
        assert!(matches!(
            SlotRef::from_raw(0, &bytes),
            Err(SlotError::SizeMismatch { actual: 4 })
        ));
    }
}

//! The 12-byte slotted-page header, living at the start of a `Data` page's
//! payload.

use crate::errors::PageError;
use binary_helpers::le::{read_le, write_le};
use paste::paste;

/// Size of the slotted-page header, in bytes.
pub const SLOTTED_HEADER_SIZE: usize = 12;

/// Zero-copy immutable view over the slotted-page header.
#[derive(Debug)]
pub struct SlottedHeaderRef<'a> {
    bytes: &'a [u8; SLOTTED_HEADER_SIZE],
}

impl<'a> SlottedHeaderRef<'a> {
    pub(super) fn new(bytes: &'a [u8]) -> Option<Self> {
        (bytes.len() == SLOTTED_HEADER_SIZE).then(|| SlottedHeaderRef {
            bytes: bytes.try_into().expect("length checked above"),
        })
    }
}

/// Zero-copy mutable view over the slotted-page header.
#[derive(Debug)]
pub struct SlottedHeaderMut<'a> {
    bytes: &'a mut [u8; SLOTTED_HEADER_SIZE],
}

impl<'a> SlottedHeaderMut<'a> {
    pub(super) fn new(bytes: &'a mut [u8]) -> Option<Self> {
        (bytes.len() == SLOTTED_HEADER_SIZE).then(|| SlottedHeaderMut {
            bytes: bytes.try_into().expect("length checked above"),
        })
    }
}

macro_rules! impl_slotted_header_accessors {
    ( $( $field_name:ident : $field_type:ty = $field_offset:expr ; )* ) => {
        paste! {
            $(
                impl<'a> SlottedHeaderRef<'a> {
                    #[doc = concat!("Reads the `", stringify!($field_name), "` field.")]
                    pub fn [<get_ $field_name>](&self) -> Result<$field_type, PageError> {
                        Ok(read_le::<$field_type>(self.bytes, $field_offset)?)
                    }
                }

                impl<'a> SlottedHeaderMut<'a> {
                    #[doc = concat!("Writes the `", stringify!($field_name), "` field.")]
                    pub fn [<set_ $field_name>](&mut self, val: $field_type) -> Result<(), PageError> {
                        write_le::<$field_type>(self.bytes, $field_offset, val)?;
                        Ok(())
                    }
                }
            )*
        }
    };
}

impl_slotted_header_accessors! {
    slot_count: u16 = 0;
    free_start: u16 = 2;
    free_end: u16 = 4;
    fragmented_bytes: u16 = 6;
    flags: u16 = 8;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_fields() {
        let mut buf = [0u8; SLOTTED_HEADER_SIZE];
        {
            let mut h = SlottedHeaderMut::new(&mut buf).unwrap();
            h.set_slot_count(3).unwrap();
            h.set_free_start(27).unwrap();
            h.set_free_end(4000).unwrap();
            h.set_fragmented_bytes(15).unwrap();
        }
        let h = SlottedHeaderRef::new(&buf).unwrap();
        assert_eq!(h.get_slot_count().unwrap(), 3);
        assert_eq!(h.get_free_start().unwrap(), 27);
        assert_eq!(h.get_free_end().unwrap(), 4000);
        assert_eq!(h.get_fragmented_bytes().unwrap(), 15);
    }
}

//! Layout and accessors for the fixed 16-byte page header.
//!
//! ```text
//! [0..4)   page id   (u32)
//! [4..5)   type tag  (u8)   0=Data 1=Index 2=FreeList 3=Overflow
//! [5..6)   flags     (u8)
//! [6..14)  LSN       (u64)
//! [14..16) reserved  (u16)
//! ```
//!
//! All multi-byte fields are little-endian.

use crate::HEADER_SIZE;
use crate::errors::PageError;
use binary_helpers::le::{read_le, write_le};
use paste::paste;

/// Zero-copy immutable view over a page header's bytes.
#[derive(Debug)]
pub struct HeaderRef<'a> {
    bytes: &'a [u8; HEADER_SIZE],
}

impl<'a> HeaderRef<'a> {
    /// Builds a `HeaderRef` over `bytes`, which must be exactly
    /// [`HEADER_SIZE`] long.
    pub fn new(bytes: &'a [u8]) -> Option<Self> {
        (bytes.len() == HEADER_SIZE).then(|| HeaderRef {
            bytes: bytes.try_into().expect("length checked above"),
        })
    }
}

/// Zero-copy mutable view over a page header's bytes.
#[derive(Debug)]
pub struct HeaderMut<'a> {
    bytes: &'a mut [u8; HEADER_SIZE],
}

impl<'a> HeaderMut<'a> {
    /// Builds a `HeaderMut` over `bytes`, which must be exactly
    /// [`HEADER_SIZE`] long.
    pub fn new(bytes: &'a mut [u8]) -> Option<Self> {
        (bytes.len() == HEADER_SIZE).then(|| HeaderMut {
            bytes: bytes.try_into().expect("length checked above"),
        })
    }
}

macro_rules! impl_header_accessors {
    ( $( $field_name:ident : $field_type:ty = $field_offset:expr ; )* ) => {
        paste! {
            $(
                #[doc = concat!("Byte offset of `", stringify!($field_name), "`.")]
                pub const [<$field_name:upper>]: usize = $field_offset;

                impl<'a> HeaderRef<'a> {
                    #[doc = concat!("Reads the `", stringify!($field_name), "` field.")]
                    pub fn [<get_ $field_name>](&self) -> Result<$field_type, PageError> {
                        Ok(read_le::<$field_type>(self.bytes, $field_offset)?)
                    }
                }

                impl<'a> HeaderMut<'a> {
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

impl_header_accessors! {
    page_id: u32 = 0;
    type_tag: u8 = 4;
    flags: u8 = 5;
    lsn: u64 = 6;
}

/// Offset of the 2 reserved bytes at the tail of the header.
pub const RESERVED: usize = 14;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_fields() {
        let mut buf = [0u8; HEADER_SIZE];
        {
            let mut h = HeaderMut::new(&mut buf).unwrap();
            h.set_page_id(7).unwrap();
            h.set_type_tag(2).unwrap();
            h.set_flags(1).unwrap();
            h.set_lsn(0x1122_3344_5566_7788).unwrap();
        }
        let h = HeaderRef::new(&buf).unwrap();
        assert_eq!(h.get_page_id().unwrap(), 7);
        assert_eq!(h.get_type_tag().unwrap(), 2);
        assert_eq!(h.get_flags().unwrap(), 1);
        assert_eq!(h.get_lsn().unwrap(), 0x1122_3344_5566_7788);
    }

    #[test]
    fn rejects_wrong_size() {
        let buf = [0u8; HEADER_SIZE - 1];
        assert!(HeaderRef::new(&buf).is_none());
    }
}

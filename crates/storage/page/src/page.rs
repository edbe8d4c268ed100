//! The `Page` struct: a fixed-size block with a typed header, a payload, and
//! in-memory pin/dirty/LSN bookkeeping.

use crate::errors::{PageError, PageResult};
use crate::header::{HeaderMut, HeaderRef};
use crate::page_id::PageId;
use crate::page_type::PageType;
use crate::{HEADER_SIZE, PAGE_SIZE, PAYLOAD_SIZE};

/// A fixed-size 4 KiB page: 16-byte header plus a 4080-byte payload, with
/// in-memory pin-count and dirty-flag state that never touches the wire
/// format.
#[derive(Debug, Clone)]
pub struct Page {
    bytes: Box<[u8; PAGE_SIZE]>,
    pin_count: u32,
    dirty: bool,
}

impl Page {
    /// Builds a fresh, zeroed page stamped with `id` and `page_type`.
    pub fn new(id: PageId, page_type: PageType) -> Self {
        let mut bytes = Box::new([0u8; PAGE_SIZE]);
        {
            let mut h = HeaderMut::new(&mut bytes[..HEADER_SIZE]).expect("header size is fixed");
            h.set_page_id(id.as_u32()).expect("in-range write");
            h.set_type_tag(page_type.into()).expect("in-range write");
            h.set_flags(0).expect("in-range write");
            h.set_lsn(0).expect("in-range write");
        }
        Self {
            bytes,
            pin_count: 0,
            dirty: false,
        }
    }

    /// Serializes the page to exactly [`PAGE_SIZE`] bytes. Little-endian for
    /// all multi-byte header fields; the slotted-page overlay (if any) is
    /// already maintained in place inside the payload.
    pub fn serialize(&self) -> [u8; PAGE_SIZE] {
        *self.bytes
    }

    /// Deserializes a page from exactly [`PAGE_SIZE`] bytes.
    ///
    /// A short read (fewer than [`PAGE_SIZE`] bytes, as happens when a file
    /// has just grown to contain a new page's offset range but the bytes
    /// were never written) is tolerated: it is treated as a fresh, empty
    /// `Data` page stamped with `id`, not an error.
    ///
    /// `id` is always re-stamped into the decoded header, overriding
    /// whatever is on the wire. A page id is nothing but its own byte
    /// offset divided by `PAGE_SIZE`, so the two can never legitimately
    /// disagree; this also makes an in-range page that was never actually
    /// written (all zero bytes, as a pre-grown mapped file reads back) come
    /// back correctly stamped with `id` instead of the zeroed-out `0`.
    pub fn deserialize(bytes: &[u8], id: PageId) -> PageResult<Self> {
        if bytes.len() < PAGE_SIZE {
            return Ok(Self::new(id, PageType::Data));
        }
        if bytes.len() != PAGE_SIZE {
            return Err(PageError::Corruption(format!(
                "page {id} had {} bytes, expected {PAGE_SIZE}",
                bytes.len()
            )));
        }
        let mut owned = Box::new([0u8; PAGE_SIZE]);
        owned.copy_from_slice(bytes);
        {
            let mut h = HeaderMut::new(&mut owned[..HEADER_SIZE]).expect("header size is fixed");
            h.set_page_id(id.as_u32()).expect("in-range write");
        }
        Ok(Self {
            bytes: owned,
            pin_count: 0,
            dirty: false,
        })
    }

    /// This page's identifier, as stamped in the header.
    pub fn id(&self) -> PageId {
        PageId::new(
            HeaderRef::new(&self.bytes[..HEADER_SIZE])
                .expect("fixed size")
                .get_page_id()
                .expect("in-range read"),
        )
    }

    /// This page's type tag.
    pub fn page_type(&self) -> PageType {
        let raw = HeaderRef::new(&self.bytes[..HEADER_SIZE])
            .expect("fixed size")
            .get_type_tag()
            .expect("in-range read");
        PageType::try_from(raw).unwrap_or(PageType::Data)
    }

    /// Overwrites this page's type tag (used when repurposing a page, e.g.
    /// into a free-list page).
    pub fn set_page_type(&mut self, page_type: PageType) {
        let mut h = HeaderMut::new(&mut self.bytes[..HEADER_SIZE]).expect("fixed size");
        h.set_type_tag(page_type.into()).expect("in-range write");
    }

    /// The page's flags byte.
    pub fn flags(&self) -> u8 {
        HeaderRef::new(&self.bytes[..HEADER_SIZE])
            .expect("fixed size")
            .get_flags()
            .expect("in-range read")
    }

    /// Sets the page's flags byte.
    pub fn set_flags(&mut self, flags: u8) {
        let mut h = HeaderMut::new(&mut self.bytes[..HEADER_SIZE]).expect("fixed size");
        h.set_flags(flags).expect("in-range write");
    }

    /// The log-sequence number last stamped on this page.
    pub fn lsn(&self) -> u64 {
        HeaderRef::new(&self.bytes[..HEADER_SIZE])
            .expect("fixed size")
            .get_lsn()
            .expect("in-range read")
    }

    /// Stamps a new LSN on this page.
    pub fn set_lsn(&mut self, lsn: u64) {
        let mut h = HeaderMut::new(&mut self.bytes[..HEADER_SIZE]).expect("fixed size");
        h.set_lsn(lsn).expect("in-range write");
    }

    /// Immutable view of the page's payload (everything after the header).
    pub fn payload(&self) -> &[u8; PAYLOAD_SIZE] {
        (&self.bytes[HEADER_SIZE..]).try_into().expect("fixed size")
    }

    /// Mutable view of the page's payload.
    pub fn payload_mut(&mut self) -> &mut [u8; PAYLOAD_SIZE] {
        (&mut self.bytes[HEADER_SIZE..])
            .try_into()
            .expect("fixed size")
    }

    /// Current pin count. A page with pin count > 0 must not be evicted.
    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    /// Increments the pin count.
    pub fn pin(&mut self) {
        self.pin_count += 1;
    }

    /// Decrements the pin count. Unpinning an already-unpinned page (count
    /// at zero) is a no-op, not an error.
    pub fn unpin(&mut self) {
        self.pin_count = self.pin_count.saturating_sub(1);
    }

    /// Whether the in-memory copy differs from what is on disk.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Marks the page dirty.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clears the dirty flag (called after a successful flush).
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_page_is_zeroed_and_stamped() {
        let p = Page::new(PageId::new(5), PageType::Data);
        assert_eq!(p.id(), PageId::new(5));
        assert_eq!(p.page_type(), PageType::Data);
        assert_eq!(p.lsn(), 0);
        assert!(p.payload().iter().all(|&b| b == 0));
    }

    #[test]
    fn serialize_deserialize_round_trip_is_bit_identical() {
        let mut p = Page::new(PageId::new(1), PageType::FreeList);
        p.set_lsn(42);
        p.payload_mut()[0] = 0xAB;
        let bytes = p.serialize();
        let p2 = Page::deserialize(&bytes, PageId::new(1)).unwrap();
        assert_eq!(p2.serialize(), bytes);
        assert_eq!(p2.lsn(), 42);
        assert_eq!(p2.payload()[0], 0xAB);
    }

    #[test]
    fn short_read_yields_fresh_empty_page() {
        let short = [0u8; 10];
        let p = Page::deserialize(&short, PageId::new(9)).unwrap();
        assert_eq!(p.id(), PageId::new(9));
        assert_eq!(p.page_type(), PageType::Data);
        assert_eq!(p.lsn(), 0);
    }

    #[test]
    fn wrong_size_not_short_is_corruption() {
        let too_long = vec![0u8; PAGE_SIZE + 1];
        assert!(Page::deserialize(&too_long, PageId::new(0)).is_err());
    }

    #[test]
    fn unpin_at_zero_is_noop() {
        let mut p = Page::new(PageId::new(0), PageType::Data);
        p.unpin();
        assert_eq!(p.pin_count(), 0);
        p.pin();
        p.pin();
        p.unpin();
        assert_eq!(p.pin_count(), 1);
    }
}

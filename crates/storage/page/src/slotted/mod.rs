//! The slotted-page overlay: a variable-length record layout living inside a
//! `Data` page's payload.
//!
//! ```text
//! [0..2)   slot count         (u16)
//! [2..4)   free-space-start   (u16, relative to payload, grows upward)
//! [4..6)   free-space-end     (u16, relative to payload, grows downward)
//! [6..8)   fragmented bytes   (u16)
//! [8..10)  flags              (u16)
//! [10..12) reserved
//! [12..12+5*slot_count) slot directory, 5 bytes/entry: offset:u16, length:u16, flags:u8
//! ... contiguous free space ...
//! record data, growing from the payload tail downward
//! ```

mod header;
mod slot;

use crate::PAYLOAD_SIZE;
use crate::errors::{PageError, PageResult};
use binary_helpers::conversions::UsizeConversion;
use header::{SlottedHeaderMut, SlottedHeaderRef, SLOTTED_HEADER_SIZE};
use slot::{SlotFlags, SlotMut, SlotRef, SLOT_SIZE};

/// Denominator spec.md's 25%-fragmentation threshold is measured against:
/// the payload with the 12-byte slotted header excluded.
const FRAGMENTATION_BASE: u32 = (PAYLOAD_SIZE - SLOTTED_HEADER_SIZE) as u32;

/// A view over a `Data` page's payload that interprets it as a slotted page.
///
/// `SlottedPage` never owns the bytes it overlays: it borrows the `Page`'s
/// payload buffer for the duration of an operation.
#[derive(Debug)]
pub struct SlottedPage<'a> {
    bytes: &'a mut [u8; PAYLOAD_SIZE],
}

impl<'a> SlottedPage<'a> {
    /// Wraps an existing payload (already initialized, or all-zero for a
    /// brand new page — zero bytes happen to decode to slot_count=0,
    /// free_start=0, free_end=0, which [`Self::initialize`] must fix up
    /// before any other operation is valid).
    pub fn open(bytes: &'a mut [u8; PAYLOAD_SIZE]) -> Self {
        Self { bytes }
    }

    /// Initializes a fresh payload: zero slots, free space spanning the
    /// entire region after the 12-byte slotted header.
    pub fn initialize(&mut self) {
        let mut h = self.header_mut();
        h.set_slot_count(0).expect("in range");
        h.set_free_start(SLOTTED_HEADER_SIZE as u16).expect("in range");
        h.set_free_end(PAYLOAD_SIZE as u16).expect("in range");
        h.set_fragmented_bytes(0).expect("in range");
        h.set_flags(0).expect("in range");
    }

    fn header_ref(&self) -> SlottedHeaderRef<'_> {
        SlottedHeaderRef::new(&self.bytes[..SLOTTED_HEADER_SIZE]).expect("fixed size")
    }

    fn header_mut(&mut self) -> SlottedHeaderMut<'_> {
        SlottedHeaderMut::new(&mut self.bytes[..SLOTTED_HEADER_SIZE]).expect("fixed size")
    }

    /// Number of slot-directory entries (live + deleted).
    pub fn slot_count(&self) -> u16 {
        self.header_ref().get_slot_count().expect("in range")
    }

    /// Number of bytes currently tracked as fragmented (dead space left by
    /// deletes and shrinking updates, reclaimed only by `compact`).
    pub fn fragmented_bytes(&self) -> u16 {
        self.header_ref().get_fragmented_bytes().expect("in range")
    }

    fn free_start(&self) -> u16 {
        self.header_ref().get_free_start().expect("in range")
    }

    fn free_end(&self) -> u16 {
        self.header_ref().get_free_end().expect("in range")
    }

    fn contiguous_free(&self) -> usize {
        self.free_end() as usize - self.free_start() as usize
    }

    /// Whether fragmented bytes exceed 25% of the usable payload.
    pub fn needs_compaction(&self) -> bool {
        self.fragmented_bytes() as u32 * 4 > FRAGMENTATION_BASE
    }

    fn slot_at(&self, slot_id: u32) -> PageResult<SlotRef<'_>> {
        let count = self.slot_count();
        if slot_id >= count as u32 {
            return Err(PageError::OutOfRange {
                slot_id,
                slot_count: count,
            });
        }
        let start = SLOTTED_HEADER_SIZE + slot_id as usize * SLOT_SIZE;
        SlotRef::from_raw(slot_id, &self.bytes[start..start + SLOT_SIZE])
            .map_err(|e| PageError::Corruption(e.to_string()))
    }

    fn slot_at_mut(&mut self, slot_id: u32) -> PageResult<SlotMut<'_>> {
        let count = self.slot_count();
        if slot_id >= count as u32 {
            return Err(PageError::OutOfRange {
                slot_id,
                slot_count: count,
            });
        }
        let start = SLOTTED_HEADER_SIZE + slot_id as usize * SLOT_SIZE;
        SlotMut::from_raw(slot_id, &mut self.bytes[start..start + SLOT_SIZE])
            .map_err(|e| PageError::Corruption(e.to_string()))
    }

    /// Inserts `data` as a new record, returning its slot id.
    ///
    /// Fails with [`PageError::OutOfSpace`] if contiguous free space is
    /// still insufficient after an automatic compaction attempt.
    pub fn insert(&mut self, data: &[u8]) -> PageResult<u32> {
        let required = data.len() + SLOT_SIZE;
        self.ensure_space(required)?;

        let new_offset = self.free_end() as usize - data.len();
        self.bytes[new_offset..new_offset + data.len()].copy_from_slice(data);

        let slot_id = self.slot_count() as u32;
        let free_start = self.free_start();
        // Grow the directory by one entry and write it.
        {
            let mut h = self.header_mut();
            h.set_slot_count(slot_id as u16 + 1)?;
            h.set_free_start(free_start + SLOT_SIZE as u16)?;
            h.set_free_end(new_offset.to_u16().map_err(|_| {
                PageError::Corruption("free_end overflowed u16".into())
            })?)?;
        }
        let start = SLOTTED_HEADER_SIZE + slot_id as usize * SLOT_SIZE;
        let mut slot = SlotMut::from_raw(slot_id, &mut self.bytes[start..start + SLOT_SIZE])
            .map_err(|e| PageError::Corruption(e.to_string()))?;
        slot.set_offset(new_offset.to_u16().expect("checked above"))
            .map_err(|e| PageError::Corruption(e.to_string()))?;
        slot.set_length(data.len().to_u16().map_err(|_| {
            PageError::OutOfSpace {
                needed: data.len(),
                available: u16::MAX as usize,
            }
        })?)
        .map_err(|e| PageError::Corruption(e.to_string()))?;
        slot.set_flags(0).map_err(|e| PageError::Corruption(e.to_string()))?;

        Ok(slot_id)
    }

    /// Reads the live record stored at `slot_id`.
    pub fn get(&self, slot_id: u32) -> PageResult<&[u8]> {
        let slot = self.slot_at(slot_id)?;
        let offset = slot.offset().map_err(|e| PageError::Corruption(e.to_string()))?;
        let flags = slot.flags().map_err(|e| PageError::Corruption(e.to_string()))?;
        if SlotFlags::from_bits(flags).deleted() {
            return Err(PageError::AlreadyDeleted(slot_id));
        }
        let length = slot.length().map_err(|e| PageError::Corruption(e.to_string()))? as usize;
        let offset = offset as usize;
        Ok(&self.bytes[offset..offset + length])
    }

    /// Updates the record at `slot_id` with `data`.
    ///
    /// Shrinking or equal-length updates overwrite in place; growing updates
    /// relocate the record (triggering a compaction if needed) and set the
    /// slot's `Updated` flag.
    pub fn update(&mut self, slot_id: u32, data: &[u8]) -> PageResult<()> {
        let (old_offset, old_len, deleted) = {
            let slot = self.slot_at(slot_id)?;
            let offset = slot.offset().map_err(|e| PageError::Corruption(e.to_string()))?;
            let length = slot.length().map_err(|e| PageError::Corruption(e.to_string()))?;
            let flags = slot.flags().map_err(|e| PageError::Corruption(e.to_string()))?;
            (offset as usize, length as usize, SlotFlags::from_bits(flags).deleted())
        };
        if deleted {
            return Err(PageError::AlreadyDeleted(slot_id));
        }

        if data.len() <= old_len {
            self.bytes[old_offset..old_offset + data.len()].copy_from_slice(data);
            let freed = (old_len - data.len()) as u16;
            let frag = self.fragmented_bytes();
            self.header_mut().set_fragmented_bytes(frag + freed)?;
            let mut slot = self.slot_at_mut(slot_id)?;
            slot.set_length(data.len().to_u16().expect("<= old_len which fit in u16"))
                .map_err(|e| PageError::Corruption(e.to_string()))?;
            return Ok(());
        }

        // Growing update: the old region becomes dead space; relocate.
        let frag = self.fragmented_bytes();
        self.header_mut()
            .set_fragmented_bytes(frag + old_len as u16)?;

        let required = data.len();
        if self.contiguous_free() < required {
            // Reclaim this slot's own dead bytes (and everyone else's) via
            // the same compaction the spec requires before failing an insert.
            self.compact_excluding(Some(slot_id));
            if self.contiguous_free() < required {
                return Err(PageError::OutOfSpace {
                    needed: required,
                    available: self.contiguous_free(),
                });
            }
        }

        let new_offset = self.free_end() as usize - data.len();
        self.bytes[new_offset..new_offset + data.len()].copy_from_slice(data);
        self.header_mut().set_free_end(
            new_offset
                .to_u16()
                .map_err(|_| PageError::Corruption("free_end overflowed u16".into()))?,
        )?;

        let mut slot = self.slot_at_mut(slot_id)?;
        slot.set_offset(new_offset.to_u16().expect("checked above"))
            .map_err(|e| PageError::Corruption(e.to_string()))?;
        slot.set_length(data.len().to_u16().map_err(|_| PageError::OutOfSpace {
            needed: data.len(),
            available: u16::MAX as usize,
        })?)
        .map_err(|e| PageError::Corruption(e.to_string()))?;
        let flags = slot.flags().map_err(|e| PageError::Corruption(e.to_string()))?;
        slot.set_flags(SlotFlags::from_bits(flags).with_updated().bits())
            .map_err(|e| PageError::Corruption(e.to_string()))?;

        Ok(())
    }

    /// Deletes the record at `slot_id`. Deleting an already-deleted slot is
    /// an error.
    pub fn delete(&mut self, slot_id: u32) -> PageResult<()> {
        let length = {
            let slot = self.slot_at(slot_id)?;
            let flags = slot.flags().map_err(|e| PageError::Corruption(e.to_string()))?;
            if SlotFlags::from_bits(flags).deleted() {
                return Err(PageError::AlreadyDeleted(slot_id));
            }
            slot.length().map_err(|e| PageError::Corruption(e.to_string()))?
        };

        let mut slot = self.slot_at_mut(slot_id)?;
        let flags = slot.flags().map_err(|e| PageError::Corruption(e.to_string()))?;
        slot.set_offset(0).map_err(|e| PageError::Corruption(e.to_string()))?;
        slot.set_flags(SlotFlags::from_bits(flags).with_deleted().bits())
            .map_err(|e| PageError::Corruption(e.to_string()))?;

        let frag = self.fragmented_bytes();
        self.header_mut().set_fragmented_bytes(frag + length)?;
        Ok(())
    }

    fn ensure_space(&mut self, required: usize) -> PageResult<()> {
        // spec.md 4.B: whenever fragmentation exceeds 25%, compact eagerly
        // before attempting the insert, not only once space proves short.
        if self.needs_compaction() {
            self.compact_excluding(None);
        }
        if self.contiguous_free() < required {
            return Err(PageError::OutOfSpace {
                needed: required,
                available: self.contiguous_free(),
            });
        }
        Ok(())
    }

    /// Rebuilds the page: live records are copied densely against the
    /// payload tail (processed in reverse slot-id order), the directory is
    /// rewritten in original slot-id order with the new offsets, and the
    /// fragmented-byte counter is reset to zero.
    ///
    /// Slot identifiers of non-deleted slots are preserved. Deleted slots
    /// keep their directory entry (so referencing them afterward still
    /// yields `AlreadyDeleted`, never a stale live record), but contribute
    /// no bytes to the new layout.
    pub fn compact(&mut self) {
        self.compact_excluding(None);
    }

    fn compact_excluding(&mut self, exclude: Option<u32>) {
        let count = self.slot_count();
        let mut entries: Vec<(u32, u16, u16, u8)> = Vec::with_capacity(count as usize);
        for id in 0..count as u32 {
            let slot = self.slot_at(id).expect("id < count");
            let offset = slot.offset().expect("in range");
            let length = slot.length().expect("in range");
            let flags = slot.flags().expect("in range");
            let live = offset != 0 && !SlotFlags::from_bits(flags).deleted() && Some(id) != exclude;
            entries.push((id, if live { length } else { 0 }, length, flags));
        }

        // Copy from an independent snapshot, not in place: live records'
        // original byte ranges routinely overlap the destination ranges
        // other records are about to be written into, so reading and
        // writing the same buffer directly would corrupt not-yet-moved data.
        let scratch = self.bytes.to_vec();

        let mut cursor = PAYLOAD_SIZE;
        let mut new_offsets = vec![0u16; count as usize];
        for id in (0..count as u32).rev() {
            let (_, live_len, _, _) = entries[id as usize];
            if live_len == 0 {
                continue;
            }
            let old_offset = self.slot_at(id).expect("id < count").offset().expect("in range") as usize;
            cursor -= live_len as usize;
            self.bytes[cursor..cursor + live_len as usize]
                .copy_from_slice(&scratch[old_offset..old_offset + live_len as usize]);
            new_offsets[id as usize] = cursor as u16;
        }

        for id in 0..count as u32 {
            let (_, live_len, orig_len, flags) = entries[id as usize];
            let mut slot = self.slot_at_mut(id).expect("id < count");
            if live_len == 0 && Some(id) != exclude {
                // Either originally deleted, or dead space from a shrink — drop its bytes.
                let is_deleted = SlotFlags::from_bits(flags).deleted();
                slot.set_offset(0).expect("in range");
                if is_deleted {
                    slot.set_length(orig_len).expect("in range");
                } else {
                    slot.set_length(0).expect("in range");
                }
            } else if Some(id) != exclude {
                slot.set_offset(new_offsets[id as usize]).expect("in range");
                slot.set_length(orig_len).expect("in range");
            }
        }

        let mut h = self.header_mut();
        h.set_free_end(cursor as u16).expect("in range");
        h.set_fragmented_bytes(0).expect("in range");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Box<[u8; PAYLOAD_SIZE]> {
        let mut bytes = Box::new([0u8; PAYLOAD_SIZE]);
        SlottedPage::open(&mut bytes).initialize();
        bytes
    }

    #[test]
    fn insert_then_get_round_trips() {
        let mut bytes = fresh();
        let mut sp = SlottedPage::open(&mut bytes);
        let id = sp.insert(b"hello").unwrap();
        assert_eq!(sp.get(id).unwrap(), b"hello");
        assert_eq!(sp.slot_count(), 1);
    }

    #[test]
    fn get_out_of_range_slot() {
        let mut bytes = fresh();
        let sp = SlottedPage::open(&mut bytes);
        assert!(matches!(
            sp.get(0),
            Err(PageError::OutOfRange { slot_id: 0, .. })
        ));
    }

    #[test]
    fn delete_then_get_is_already_deleted() {
        let mut bytes = fresh();
        let mut sp = SlottedPage::open(&mut bytes);
        let id = sp.insert(b"xyz").unwrap();
        sp.delete(id).unwrap();
        assert!(matches!(sp.get(id), Err(PageError::AlreadyDeleted(_))));
        assert!(matches!(sp.delete(id), Err(PageError::AlreadyDeleted(_))));
    }

    #[test]
    fn update_in_place_when_shrinking() {
        let mut bytes = fresh();
        let mut sp = SlottedPage::open(&mut bytes);
        let id = sp.insert(b"0123456789").unwrap();
        sp.update(id, b"abc").unwrap();
        assert_eq!(sp.get(id).unwrap(), b"abc");
        assert_eq!(sp.fragmented_bytes(), 7);
    }

    #[test]
    fn update_relocates_when_growing() {
        let mut bytes = fresh();
        let mut sp = SlottedPage::open(&mut bytes);
        let id = sp.insert(b"abc").unwrap();
        sp.update(id, b"0123456789").unwrap();
        assert_eq!(sp.get(id).unwrap(), b"0123456789");
    }

    #[test]
    fn compaction_reclaims_fragmented_space_and_preserves_live_slots() {
        let mut bytes = fresh();
        let mut sp = SlottedPage::open(&mut bytes);
        let mut ids = Vec::new();
        for _ in 0..4 {
            ids.push(sp.insert(&[7u8; 300]).unwrap());
        }
        for &id in &ids {
            sp.delete(id).unwrap();
        }
        assert!(sp.needs_compaction());

        let new_id = sp.insert(b"new data").unwrap();
        // insert() triggers an automatic compaction since space was short.
        assert_eq!(sp.fragmented_bytes(), 0);
        assert_eq!(sp.get(new_id).unwrap(), b"new data");
        for &id in &ids {
            assert!(matches!(sp.get(id), Err(PageError::AlreadyDeleted(_))));
        }
    }

    #[test]
    fn compact_preserves_live_values_in_reverse_order() {
        let mut bytes = fresh();
        let mut sp = SlottedPage::open(&mut bytes);
        let a = sp.insert(b"AAAA").unwrap();
        let b = sp.insert(b"BBBB").unwrap();
        let c = sp.insert(b"CCCC").unwrap();
        sp.delete(b).unwrap();
        sp.compact();
        assert_eq!(sp.get(a).unwrap(), b"AAAA");
        assert_eq!(sp.get(c).unwrap(), b"CCCC");
        assert!(matches!(sp.get(b), Err(PageError::AlreadyDeleted(_))));
        assert_eq!(sp.fragmented_bytes(), 0);
    }

    #[test]
    fn insert_fails_with_out_of_space_when_page_is_full_and_not_fragmented() {
        let mut bytes = fresh();
        let mut sp = SlottedPage::open(&mut bytes);
        loop {
            if sp.insert(&[0u8; 200]).is_err() {
                break;
            }
        }
    }
}

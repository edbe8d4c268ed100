//! The on-disk layout of a `FreeList`-typed page's payload: an 8-byte
//! sub-header (`next: u32`, `count: u32`) followed by a packed array of
//! `u32` page identifiers.

use crate::errors::{FreeListError, FreeListResult};
use binary_helpers::le::{read_le, write_le};
use page::PAYLOAD_SIZE;

/// Size of the sub-header living at the start of a free-list page's payload.
pub const FREE_LIST_HEADER_SIZE: usize = 8;

/// Sentinel `next` value meaning "no further page in the chain".
pub const NO_NEXT: u32 = 0;

/// Maximum number of page-id entries a single free-list page can hold.
pub const CAPACITY: usize = (PAYLOAD_SIZE - FREE_LIST_HEADER_SIZE) / 4;

fn entry_offset(index: usize) -> usize {
    FREE_LIST_HEADER_SIZE + index * 4
}

/// Zero-copy view over a `FreeList`-typed page's payload.
pub struct FreeListPage<'a> {
    bytes: &'a mut [u8; PAYLOAD_SIZE],
}

impl<'a> FreeListPage<'a> {
    /// Wraps an existing payload without touching its contents.
    pub fn open(bytes: &'a mut [u8; PAYLOAD_SIZE]) -> Self {
        Self { bytes }
    }

    /// Zeroes the sub-header, leaving an empty entry array.
    pub fn initialize(&mut self) {
        write_le::<u32>(self.bytes, 0, NO_NEXT).expect("in-range write");
        write_le::<u32>(self.bytes, 4, 0).expect("in-range write");
    }

    /// The next page in the chain, or `None` at the tail.
    pub fn next(&self) -> FreeListResult<Option<u32>> {
        let raw = read_le::<u32>(self.bytes, 0)?;
        Ok((raw != NO_NEXT).then_some(raw))
    }

    /// Sets the next-page-in-chain pointer. Pass `None` to mark the tail.
    pub fn set_next(&mut self, next: Option<u32>) -> FreeListResult<()> {
        Ok(write_le::<u32>(self.bytes, 0, next.unwrap_or(NO_NEXT))?)
    }

    /// Number of live entries currently stored in this page.
    pub fn count(&self) -> FreeListResult<u32> {
        Ok(read_le::<u32>(self.bytes, 4)?)
    }

    fn set_count(&mut self, count: u32) -> FreeListResult<()> {
        Ok(write_le::<u32>(self.bytes, 4, count)?)
    }

    /// Whether this page's entry array has no spare capacity.
    pub fn is_full(&self) -> FreeListResult<bool> {
        Ok(self.count()? as usize >= CAPACITY)
    }

    /// Appends a page id to the entry array.
    pub fn push_entry(&mut self, page_id: u32) -> FreeListResult<()> {
        let count = self.count()?;
        if count as usize >= CAPACITY {
            return Err(FreeListError::PageFull {
                capacity: CAPACITY as u32,
            });
        }
        let offset = entry_offset(count as usize);
        write_le::<u32>(self.bytes, offset, page_id)?;
        self.set_count(count + 1)?;
        Ok(())
    }

    /// Removes and returns the most recently pushed page id.
    pub fn pop_entry(&mut self) -> FreeListResult<u32> {
        let count = self.count()?;
        if count == 0 {
            return Err(FreeListError::PageEmpty);
        }
        let offset = entry_offset(count as usize - 1);
        let id = read_le::<u32>(self.bytes, offset)?;
        self.set_count(count - 1)?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_round_trips_in_lifo_order() {
        let mut payload = [0u8; PAYLOAD_SIZE];
        let mut fl = FreeListPage::open(&mut payload);
        fl.initialize();
        fl.set_next(Some(7)).unwrap();
        fl.push_entry(10).unwrap();
        fl.push_entry(11).unwrap();
        fl.push_entry(12).unwrap();
        assert_eq!(fl.count().unwrap(), 3);
        assert_eq!(fl.pop_entry().unwrap(), 12);
        assert_eq!(fl.pop_entry().unwrap(), 11);
        assert_eq!(fl.count().unwrap(), 1);
        assert_eq!(fl.next().unwrap(), Some(7));
    }

    #[test]
    fn pop_on_empty_page_errors() {
        let mut payload = [0u8; PAYLOAD_SIZE];
        let mut fl = FreeListPage::open(&mut payload);
        fl.initialize();
        assert!(matches!(fl.pop_entry(), Err(FreeListError::PageEmpty)));
    }

    #[test]
    fn push_past_capacity_errors() {
        let mut payload = [0u8; PAYLOAD_SIZE];
        let mut fl = FreeListPage::open(&mut payload);
        fl.initialize();
        for i in 0..CAPACITY as u32 {
            fl.push_entry(i).unwrap();
        }
        assert!(fl.is_full().unwrap());
        assert!(matches!(
            fl.push_entry(999),
            Err(FreeListError::PageFull { .. })
        ));
    }

    #[test]
    fn no_next_sentinel_round_trips_as_none() {
        let mut payload = [0u8; PAYLOAD_SIZE];
        let mut fl = FreeListPage::open(&mut payload);
        fl.initialize();
        assert_eq!(fl.next().unwrap(), None);
    }
}

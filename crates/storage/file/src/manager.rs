//! The capability set a disk manager exposes, shared by the positional and
//! memory-mapped implementations.

use crate::errors::DiskResult;
use page::{Page, PageId};
use std::ops::Range;

/// Authoritative page I/O: allocation, free-list maintenance, and raw
/// read/write of whole pages. Neither decodes nor encodes page contents;
/// that is the codec layer's job one level up.
pub trait DiskManager: Send + Sync {
    /// Returns a reusable page id if the free list has one, otherwise the
    /// next value of the monotonic counter.
    fn allocate_page(&self) -> DiskResult<PageId>;

    /// Returns `id` to the free list. Fails if `id` was never allocated.
    /// Deallocating an id that is already on the free list (a double free)
    /// is not itself detected and corrupts the chain — callers own the
    /// invariant that a live id is deallocated at most once.
    fn deallocate_page(&self, id: PageId) -> DiskResult<()>;

    /// Reads the page at `id`. A short read (page never written) yields a
    /// fresh empty `Data` page rather than an error.
    fn read_page(&self, id: PageId) -> DiskResult<Page>;

    /// Writes `page` at its own id's offset.
    fn write_page(&self, page: &Page) -> DiskResult<()>;

    /// Flushes any OS-buffered writes to stable storage.
    fn sync(&self) -> DiskResult<()>;

    /// Syncs and releases the underlying file handle.
    fn close(self) -> DiskResult<()>
    where
        Self: Sized;

    /// A snapshot of the manager's allocation bookkeeping.
    fn stats(&self) -> DiskStats;

    /// Compacts a single `Data` page if its fragmentation ratio exceeds the
    /// threshold. A no-op for non-`Data` pages.
    fn compact_page(&self, id: PageId) -> DiskResult<bool>;

    /// Compacts every `Data` page whose id falls in `range`, returning
    /// aggregate statistics.
    fn compact_range(&self, range: Range<u32>) -> DiskResult<CompactionStats>;

    /// Compacts every allocated `Data` page.
    fn scan_for_compaction(&self) -> DiskResult<CompactionStats>;
}

/// A snapshot of a disk manager's allocation bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskStats {
    /// Next value the monotonic page-id counter will hand out.
    pub next_page_id: u32,
    /// Number of structural pages currently spent on free-list bookkeeping.
    pub free_list_page_count: u32,
    /// Current size of the backing file, in bytes.
    pub file_size_bytes: u64,
}

/// Aggregate result of a compaction sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompactionStats {
    /// Total pages visited by the sweep.
    pub pages_scanned: u32,
    /// Pages that were actually rewritten by compaction.
    pub pages_compacted: u32,
    /// Pages visited but skipped because they were not `Data` pages.
    pub pages_skipped_non_data: u32,
    /// Pages that could not be read or decoded during the sweep.
    pub pages_failed: u32,
}

/// An access-pattern hint for the memory-mapped manager. A no-op on
/// platforms without `madvise`-style support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessHint {
    /// No discernible pattern; the default.
    Random,
    /// Pages will mostly be read in increasing id order.
    Sequential,
    /// The given page range will be needed soon.
    WillNeed(Range<PageId>),
}

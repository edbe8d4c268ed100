//! A single slot in the buffer pool's arena.

use page::{Page, PageId, PageType};
use std::sync::atomic::{AtomicBool, AtomicU32};
use std::sync::RwLock;

/// Index into [`crate::pool::BufferPool`]'s frame arena.
pub(crate) type FrameId = usize;

/// A resident page plus the bookkeeping the pool needs to pin, flush, and
/// evict it. `pin_count` and `dirty` are atomics so callers can inspect and
/// update them without taking the page's own lock.
#[derive(Debug)]
pub(crate) struct Frame {
    pub(crate) page: RwLock<Page>,
    pub(crate) pin_count: AtomicU32,
    pub(crate) dirty: AtomicBool,
}

impl Frame {
    /// An unoccupied frame, parked on a placeholder page id until claimed.
    pub(crate) fn empty() -> Self {
        Self {
            page: RwLock::new(Page::new(PageId::new(u32::MAX), PageType::Data)),
            pin_count: AtomicU32::new(0),
            dirty: AtomicBool::new(false),
        }
    }
}

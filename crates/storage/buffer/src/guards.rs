//! A handle to a pinned, resident page.

use crate::pool::BufferPool;
use file::manager::DiskManager;
use page::{Page, PageId};
use std::sync::{RwLockReadGuard, RwLockWriteGuard};

/// A pin on a resident page. Holding one guarantees the page cannot be
/// evicted. Callers must call [`BufferPool::unpin`] with `id()` when done;
/// dropping a `PagePin` does not itself unpin (the pool's unpin call is
/// where the caller states whether it left the page dirty).
pub struct PagePin<'a, D: DiskManager> {
    pool: &'a BufferPool<D>,
    frame_id: crate::frame::FrameId,
    id: PageId,
}

impl<'a, D: DiskManager> PagePin<'a, D> {
    pub(crate) fn new(pool: &'a BufferPool<D>, frame_id: crate::frame::FrameId, id: PageId) -> Self {
        Self { pool, frame_id, id }
    }

    /// The page id this pin covers.
    pub fn id(&self) -> PageId {
        self.id
    }

    /// A read lock on the page's contents.
    pub fn read(&self) -> RwLockReadGuard<'_, Page> {
        self.pool.frame(self.frame_id).page.read().unwrap()
    }

    /// A write lock on the page's contents. Taking this does not implicitly
    /// mark the page dirty; pass `dirty: true` to `unpin` when done.
    pub fn write(&self) -> RwLockWriteGuard<'_, Page> {
        self.pool.frame(self.frame_id).page.write().unwrap()
    }
}

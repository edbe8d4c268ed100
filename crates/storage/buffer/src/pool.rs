//! The buffer pool: a fixed-size arena of frames, an LRU eviction order, and
//! miss-coalescing so two threads faulting on the same page id never issue
//! two disk reads.

use crate::errors::{BufferError, BufferResult};
use crate::frame::{Frame, FrameId};
use crate::guards::PagePin;
use crate::lru::Lru;
use file::manager::DiskManager;
use page::{Page, PageId, PageType};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use tracing::{debug, trace};

/// Point-in-time hit/miss/eviction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferPoolStats {
    /// Fetches that found the page already resident.
    pub hits: u64,
    /// Fetches that had to load the page from disk.
    pub misses: u64,
    /// Frames reclaimed from another page to satisfy a fetch or new_page.
    pub evictions: u64,
}

#[derive(Default)]
struct RawStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Coordination point for a page whose disk load is in flight. Threads that
/// find one already being loaded wait on its condvar instead of issuing a
/// second read.
struct LoadGate {
    state: Mutex<LoadState>,
    cond: Condvar,
}

enum LoadState {
    Loading,
    Ready(FrameId),
    Failed(String),
}

/// Everything the pool's structural operations (insertion, eviction) need to
/// touch together. Only these operations — never an ordinary page read or
/// write — hold this lock.
struct Shared {
    table: HashMap<PageId, FrameId>,
    lru: Lru,
    free: Vec<FrameId>,
    loading: HashMap<PageId, Arc<LoadGate>>,
}

/// A fixed-capacity, LRU-evicting cache of [`Page`]s backed by a
/// [`DiskManager`].
#[derive(Debug)]
pub struct BufferPool<D: DiskManager> {
    disk: Arc<D>,
    frames: Vec<Frame>,
    shared: Mutex<Shared>,
    stats: RawStats,
}

impl std::fmt::Debug for RawStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawStats").finish()
    }
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("resident", &self.table.len())
            .field("free", &self.free.len())
            .field("loading", &self.loading.len())
            .finish()
    }
}

impl<D: DiskManager> BufferPool<D> {
    /// Builds a pool with room for `capacity` resident pages.
    pub fn new(disk: Arc<D>, capacity: NonZeroUsize) -> Self {
        let capacity = capacity.get();
        let frames = (0..capacity).map(|_| Frame::empty()).collect();
        debug!(capacity, "buffer pool initialized");
        Self {
            disk,
            frames,
            shared: Mutex::new(Shared {
                table: HashMap::with_capacity(capacity),
                lru: Lru::new(capacity),
                free: (0..capacity).collect(),
                loading: HashMap::new(),
            }),
            stats: RawStats::default(),
        }
    }

    /// Fetches and pins `id`, loading it from disk on a miss. Concurrent
    /// misses on the same id coalesce onto a single disk read.
    pub fn fetch(&self, id: PageId) -> BufferResult<PagePin<'_, D>> {
        loop {
            enum Action {
                Hit(FrameId),
                Wait(Arc<LoadGate>),
                Load(FrameId, Arc<LoadGate>),
            }

            let action = {
                let mut shared = self.shared.lock().unwrap();
                if let Some(&frame_id) = shared.table.get(&id) {
                    shared.lru.touch(frame_id);
                    Action::Hit(frame_id)
                } else if let Some(gate) = shared.loading.get(&id).cloned() {
                    Action::Wait(gate)
                } else {
                    let frame_id = self.claim_frame(&mut shared)?;
                    let gate = Arc::new(LoadGate {
                        state: Mutex::new(LoadState::Loading),
                        cond: Condvar::new(),
                    });
                    shared.loading.insert(id, gate.clone());
                    Action::Load(frame_id, gate)
                }
            };

            match action {
                Action::Hit(frame_id) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    self.frames[frame_id].pin_count.fetch_add(1, Ordering::AcqRel);
                    return Ok(PagePin::new(self, frame_id, id));
                }
                Action::Wait(gate) => return self.wait_for_load(id, &gate),
                Action::Load(frame_id, gate) => {
                    trace!(page = %id, frame_id, "loading page from disk");
                    match self.disk.read_page(id) {
                        Ok(page) => {
                            *self.frames[frame_id].page.write().unwrap() = page;
                            self.frames[frame_id].dirty.store(false, Ordering::Release);
                            self.frames[frame_id].pin_count.store(1, Ordering::Release);
                            {
                                let mut shared = self.shared.lock().unwrap();
                                shared.table.insert(id, frame_id);
                                shared.lru.push_front(frame_id);
                                shared.loading.remove(&id);
                            }
                            {
                                let mut state = gate.state.lock().unwrap();
                                *state = LoadState::Ready(frame_id);
                                gate.cond.notify_all();
                            }
                            self.stats.misses.fetch_add(1, Ordering::Relaxed);
                            return Ok(PagePin::new(self, frame_id, id));
                        }
                        Err(e) => {
                            {
                                let mut shared = self.shared.lock().unwrap();
                                shared.free.push(frame_id);
                                shared.loading.remove(&id);
                            }
                            {
                                let mut state = gate.state.lock().unwrap();
                                *state = LoadState::Failed(e.to_string());
                                gate.cond.notify_all();
                            }
                            return Err(BufferError::Disk(e));
                        }
                    }
                }
            }
        }
    }

    fn wait_for_load(&self, id: PageId, gate: &LoadGate) -> BufferResult<PagePin<'_, D>> {
        let mut state = gate.state.lock().unwrap();
        loop {
            match &*state {
                LoadState::Ready(frame_id) => {
                    let frame_id = *frame_id;
                    self.frames[frame_id].pin_count.fetch_add(1, Ordering::AcqRel);
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(PagePin::new(self, frame_id, id));
                }
                LoadState::Failed(message) => {
                    return Err(BufferError::Disk(file::errors::DiskError::Corruption(
                        message.clone(),
                    )))
                }
                LoadState::Loading => {
                    state = gate.cond.wait(state).unwrap();
                }
            }
        }
    }

    /// Allocates a fresh page on disk and pins it as a blank `Data` page.
    pub fn new_page(&self) -> BufferResult<PagePin<'_, D>> {
        let id = self.disk.allocate_page()?;
        let mut shared = self.shared.lock().unwrap();
        let frame_id = match self.claim_frame(&mut shared) {
            Ok(frame_id) => frame_id,
            Err(e) => {
                drop(shared);
                let _ = self.disk.deallocate_page(id);
                return Err(e);
            }
        };
        *self.frames[frame_id].page.write().unwrap() = Page::new(id, PageType::Data);
        self.frames[frame_id].dirty.store(true, Ordering::Release);
        self.frames[frame_id].pin_count.store(1, Ordering::Release);
        shared.table.insert(id, frame_id);
        shared.lru.push_front(frame_id);
        Ok(PagePin::new(self, frame_id, id))
    }

    /// Claims a frame for a newly resident page: a free slot if one exists,
    /// otherwise the least-recently-used unpinned frame (flushed first if
    /// dirty). Caller already holds `shared`.
    fn claim_frame(&self, shared: &mut Shared) -> BufferResult<FrameId> {
        if let Some(frame_id) = shared.free.pop() {
            return Ok(frame_id);
        }
        let mut cursor = shared.lru.tail();
        while let Some(frame_id) = cursor {
            if self.frames[frame_id].pin_count.load(Ordering::Acquire) == 0 {
                self.flush_frame(frame_id)?;
                let victim_id = self.frames[frame_id].page.read().unwrap().id();
                shared.table.remove(&victim_id);
                shared.lru.remove(frame_id);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                return Ok(frame_id);
            }
            cursor = shared.lru.prev_of(frame_id);
        }
        Err(BufferError::PoolExhausted)
    }

    /// Decrements `id`'s pin count and, if `dirty`, marks it dirty. A no-op
    /// on an already-unpinned page.
    pub fn unpin(&self, id: PageId, dirty: bool) -> BufferResult<()> {
        let frame_id = {
            let shared = self.shared.lock().unwrap();
            *shared.table.get(&id).ok_or(BufferError::NotResident(id))?
        };
        let frame = &self.frames[frame_id];
        let _ = frame
            .pin_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| Some(v.saturating_sub(1)));
        if dirty {
            frame.dirty.store(true, Ordering::Release);
        }
        Ok(())
    }

    /// Writes `id`'s frame to disk if dirty, clearing the dirty flag on
    /// success.
    pub fn flush_page(&self, id: PageId) -> BufferResult<()> {
        let frame_id = {
            let shared = self.shared.lock().unwrap();
            *shared.table.get(&id).ok_or(BufferError::NotResident(id))?
        };
        self.flush_frame(frame_id)
    }

    fn flush_frame(&self, frame_id: FrameId) -> BufferResult<()> {
        let frame = &self.frames[frame_id];
        if frame.dirty.load(Ordering::Acquire) {
            let page = frame.page.read().unwrap().clone();
            self.disk.write_page(&page)?;
            frame.dirty.store(false, Ordering::Release);
        }
        Ok(())
    }

    /// Flushes every dirty resident frame. Stops at the first I/O error,
    /// leaving the remainder dirty so a later call can finish the job.
    pub fn flush_all(&self) -> BufferResult<()> {
        let frame_ids: Vec<FrameId> = {
            let shared = self.shared.lock().unwrap();
            shared.table.values().copied().collect()
        };
        for frame_id in frame_ids {
            self.flush_frame(frame_id)?;
        }
        Ok(())
    }

    /// Removes `id` from the pool (if resident) and frees it on disk. Fails
    /// if the page is currently pinned.
    pub fn delete_page(&self, id: PageId) -> BufferResult<()> {
        {
            let mut shared = self.shared.lock().unwrap();
            if let Some(&frame_id) = shared.table.get(&id) {
                if self.frames[frame_id].pin_count.load(Ordering::Acquire) > 0 {
                    return Err(BufferError::Pinned(id));
                }
                shared.table.remove(&id);
                shared.lru.remove(frame_id);
                shared.free.push(frame_id);
                self.frames[frame_id].dirty.store(false, Ordering::Release);
            }
        }
        self.disk.deallocate_page(id)?;
        Ok(())
    }

    /// A snapshot of hit/miss/eviction counters.
    pub fn stats(&self) -> BufferPoolStats {
        BufferPoolStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn frame(&self, frame_id: FrameId) -> &Frame {
        &self.frames[frame_id]
    }

    /// Access to the underlying disk manager, e.g. for `sync`/`stats`.
    pub fn disk(&self) -> &D {
        &self.disk
    }

    /// Consumes the pool and returns its disk manager handle, e.g. to call
    /// `DiskManager::close` (which takes `self` by value and so cannot be
    /// reached through `disk()`'s borrow).
    pub fn into_disk(self) -> Arc<D> {
        self.disk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use file::positional::PositionalDiskManager;
    use std::sync::Arc;

    fn pool(capacity: usize) -> (tempfile::TempDir, BufferPool<PositionalDiskManager>) {
        let dir = tempfile::tempdir().unwrap();
        let disk = Arc::new(PositionalDiskManager::open(dir.path().join("data.db")).unwrap());
        let pool = BufferPool::new(disk, NonZeroUsize::new(capacity).unwrap());
        (dir, pool)
    }

    #[test]
    fn new_page_then_fetch_is_a_hit() {
        let (_dir, pool) = pool(4);
        let id = {
            let pin = pool.new_page().unwrap();
            pin.id()
        };
        pool.unpin(id, true).unwrap();
        let _pin = pool.fetch(id).unwrap();
        pool.unpin(id, false).unwrap();
        assert_eq!(pool.stats().hits, 1);
    }

    #[test]
    fn eviction_reclaims_unpinned_frames() {
        let (_dir, pool) = pool(2);
        let a = pool.new_page().unwrap().id();
        pool.unpin(a, true).unwrap();
        let b = pool.new_page().unwrap().id();
        pool.unpin(b, true).unwrap();
        // both frames full and unpinned; a third page must evict one
        let c = pool.new_page().unwrap().id();
        pool.unpin(c, true).unwrap();
        assert_eq!(pool.stats().evictions, 1);
        assert_ne!(a, c);
    }

    #[test]
    fn pinned_frame_blocks_eviction() {
        let (_dir, pool) = pool(1);
        let a_pin = pool.new_page().unwrap();
        let a = a_pin.id();
        // a stays pinned; requesting a second page has nowhere to go
        let err = pool.new_page().unwrap_err();
        assert!(matches!(err, BufferError::PoolExhausted));
        drop(a_pin);
        pool.unpin(a, false).unwrap();
    }

    #[test]
    fn delete_pinned_page_fails() {
        let (_dir, pool) = pool(2);
        let pin = pool.new_page().unwrap();
        let id = pin.id();
        assert!(matches!(pool.delete_page(id), Err(BufferError::Pinned(_))));
        drop(pin);
        pool.unpin(id, false).unwrap();
        pool.delete_page(id).unwrap();
    }

    #[test]
    fn flush_all_clears_dirty_frames() {
        let (_dir, pool) = pool(4);
        let id = pool.new_page().unwrap().id();
        pool.unpin(id, true).unwrap();
        pool.flush_all().unwrap();
        pool.flush_page(id).unwrap();
    }

    #[test]
    fn concurrent_fetch_of_same_page_coalesces() {
        use std::thread;
        let (_dir, pool) = pool(4);
        let pool = Arc::new(pool);
        let id = pool.new_page().unwrap().id();
        pool.unpin(id, true).unwrap();
        pool.flush_all().unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || {
                    let pin = pool.fetch(id).unwrap();
                    pool.unpin(pin.id(), false).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(pool.stats().misses, 1);
    }
}

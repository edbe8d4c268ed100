//! A disk manager backed by a growable memory mapping.
//!
//! `memmap2::MmapMut::map_mut` is an `unsafe fn` (the caller must promise
//! the backing file isn't concurrently truncated by another process), so
//! this module carries the workspace's only exception to
//! `#![forbid(unsafe_code)]`.

#![allow(unsafe_code)]

use crate::errors::{DiskError, DiskResult};
use crate::manager::{AccessHint, CompactionStats, DiskManager, DiskStats};
use crate::metadata;
use page::slotted::SlottedPage;
use page::{Page, PageId, PageType, PAGE_SIZE};
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};

/// Initial mapping size for a brand-new data file.
pub const DEFAULT_INITIAL_SIZE: u64 = 256 * 1024 * 1024;
/// Size the mapping grows by whenever an offset exceeds it.
pub const DEFAULT_GROWTH_INCREMENT: u64 = 64 * 1024 * 1024;

enum CompactedOutcome {
    Compacted,
    Unchanged,
    SkippedNonData,
}

struct State {
    file: File,
    mmap: MmapMut,
    next_page_id: u32,
    free_list: freelist::FreeListDescriptor,
    free_list_path: PathBuf,
    initial_size: u64,
    growth_increment: u64,
}

/// A disk manager that maps the entire data file into memory and serves
/// pages as slices into that mapping.
pub struct MappedDiskManager {
    state: RwLock<State>,
}

impl std::fmt::Debug for MappedDiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedDiskManager").finish_non_exhaustive()
    }
}

impl MappedDiskManager {
    /// Opens `path` with the default initial size and growth increment.
    pub fn open<P: AsRef<Path>>(path: P) -> DiskResult<Self> {
        Self::open_with(path, DEFAULT_INITIAL_SIZE, DEFAULT_GROWTH_INCREMENT)
    }

    /// Opens `path`, growing the mapping in `growth_increment`-sized steps
    /// once past `initial_size`.
    pub fn open_with<P: AsRef<Path>>(
        path: P,
        initial_size: u64,
        growth_increment: u64,
    ) -> DiskResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        // Captured before the eager pre-growth below: the counter must be
        // reconstructed from how much of the file actually holds written
        // pages, not from the mapping's padded-out capacity.
        let current_len = file.metadata()?.len();
        let next_page_id = (current_len / PAGE_SIZE as u64) as u32;

        let target_len = current_len.max(initial_size);
        if target_len > current_len {
            file.set_len(target_len)?;
        }
        // SAFETY: the data file is owned exclusively by this process for the
        // duration of the mapping; callers are responsible for not
        // externally truncating it.
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        let free_list_path = metadata::sidecar_path(path);
        let free_list = metadata::load_free_list(&free_list_path)?;
        debug!(
            next_page_id,
            mapped_bytes = target_len,
            "opened mapped disk manager"
        );

        Ok(Self {
            state: RwLock::new(State {
                file,
                mmap,
                next_page_id,
                free_list,
                free_list_path,
                initial_size,
                growth_increment,
            }),
        })
    }

    fn ensure_mapped(state: &mut State, id: PageId) -> DiskResult<()> {
        let required = id.byte_offset(PAGE_SIZE) + PAGE_SIZE as u64;
        if required <= state.mmap.len() as u64 {
            return Ok(());
        }
        let mut new_len = state.mmap.len() as u64;
        if new_len == 0 {
            new_len = state.initial_size;
        }
        while new_len < required {
            new_len += state.growth_increment;
        }
        debug!(from = state.mmap.len(), to = new_len, "growing memory mapping");
        // Drop the old mapping before truncating: munmap, then grow the
        // file, then remap. Every previously-written byte must survive.
        state.mmap.flush()?;
        drop(std::mem::replace(&mut state.mmap, empty_mmap()?));
        state.file.set_len(new_len)?;
        // SAFETY: same invariant as the initial mapping in `open_with`.
        state.mmap = unsafe { MmapMut::map_mut(&state.file)? };
        Ok(())
    }

    fn raw_read(state: &State, id: PageId) -> DiskResult<Page> {
        let offset = id.byte_offset(PAGE_SIZE) as usize;
        if offset + PAGE_SIZE > state.mmap.len() {
            return Ok(Page::new(id, PageType::Data));
        }
        Ok(Page::deserialize(&state.mmap[offset..offset + PAGE_SIZE], id)?)
    }

    fn raw_write(state: &mut State, page: &Page) -> DiskResult<()> {
        Self::ensure_mapped(state, page.id())?;
        let offset = page.id().byte_offset(PAGE_SIZE) as usize;
        state.mmap[offset..offset + PAGE_SIZE].copy_from_slice(&page.serialize());
        Ok(())
    }

    fn persist_free_list(state: &State) -> DiskResult<()> {
        metadata::store_free_list(&state.free_list_path, &state.free_list)
    }

    /// Truncates the backing file down to exactly the pages actually handed
    /// out, undoing the eager pre-growth and increment rounding from
    /// `open_with`/`ensure_mapped` so a clean reopen's `⌊file_size /
    /// PAGE_SIZE⌋` reconstruction lands on `next_page_id` precisely.
    ///
    /// Only safe to call once nothing else still holds a live mapping over
    /// the truncated tail, so this runs at `close()`, never `sync()`.
    fn truncate_to_logical_size(state: &mut State) -> DiskResult<()> {
        let logical_len = state.next_page_id as u64 * PAGE_SIZE as u64;
        state.mmap.flush()?;
        drop(std::mem::replace(&mut state.mmap, empty_mmap()?));
        state.file.set_len(logical_len)?;
        Ok(())
    }

    fn compact_one(state: &mut State, id: PageId) -> DiskResult<CompactedOutcome> {
        let mut page = Self::raw_read(state, id)?;
        if page.page_type() != PageType::Data {
            return Ok(CompactedOutcome::SkippedNonData);
        }
        let needs_compaction = {
            let payload = page.payload_mut();
            SlottedPage::open(payload).needs_compaction()
        };
        if !needs_compaction {
            return Ok(CompactedOutcome::Unchanged);
        }
        {
            let payload = page.payload_mut();
            SlottedPage::open(payload).compact();
        }
        Self::raw_write(state, &page)?;
        Ok(CompactedOutcome::Compacted)
    }

    /// Applies `hint` to the mapping. A best-effort no-op on platforms
    /// without `madvise` support (e.g. Windows).
    pub fn advise(&self, hint: AccessHint) -> DiskResult<()> {
        let guard = self.state.read().unwrap();
        Self::advise_impl(&guard.mmap, hint);
        Ok(())
    }

    #[cfg(unix)]
    fn advise_impl(mmap: &MmapMut, hint: AccessHint) {
        let advice = match hint {
            AccessHint::Random => memmap2::Advice::Random,
            AccessHint::Sequential => memmap2::Advice::Sequential,
            AccessHint::WillNeed(_) => memmap2::Advice::WillNeed,
        };
        if let Err(e) = mmap.advise(advice) {
            warn!(error = %e, "madvise hint failed, ignoring");
        }
    }

    #[cfg(not(unix))]
    fn advise_impl(_mmap: &MmapMut, _hint: AccessHint) {
        // madvise has no equivalent on this platform; the hint is dropped.
    }
}

/// memmap2 has no "unmapped" sentinel; a zero-length anonymous mapping
/// stands in for the brief window between dropping the old mapping and
/// remapping the grown file.
fn empty_mmap() -> DiskResult<MmapMut> {
    Ok(MmapMut::map_anon(1)?)
}

impl DiskManager for MappedDiskManager {
    fn allocate_page(&self) -> DiskResult<PageId> {
        let mut guard = self.state.write().unwrap();
        let state = &mut *guard;
        if let Some(id) = pop_free_list(state)? {
            return Ok(id);
        }
        let id = PageId::new(state.next_page_id);
        state.next_page_id += 1;
        Ok(id)
    }

    fn deallocate_page(&self, id: PageId) -> DiskResult<()> {
        let mut guard = self.state.write().unwrap();
        let state = &mut *guard;
        if id.as_u32() >= state.next_page_id {
            return Err(DiskError::InvalidPageId {
                id: id.as_u32(),
                next: state.next_page_id,
            });
        }
        push_free_list(state, id)
    }

    fn read_page(&self, id: PageId) -> DiskResult<Page> {
        let guard = self.state.read().unwrap();
        Self::raw_read(&guard, id)
    }

    fn write_page(&self, page: &Page) -> DiskResult<()> {
        let mut guard = self.state.write().unwrap();
        Self::raw_write(&mut guard, page)
    }

    fn sync(&self) -> DiskResult<()> {
        let guard = self.state.read().unwrap();
        Self::persist_free_list(&guard)?;
        guard.mmap.flush()?;
        Ok(())
    }

    fn close(self) -> DiskResult<()> {
        let mut guard = self.state.write().unwrap();
        Self::persist_free_list(&guard)?;
        Self::truncate_to_logical_size(&mut guard)?;
        Ok(())
    }

    fn stats(&self) -> DiskStats {
        let guard = self.state.read().unwrap();
        DiskStats {
            next_page_id: guard.next_page_id,
            free_list_page_count: guard.free_list.page_count(),
            file_size_bytes: guard.mmap.len() as u64,
        }
    }

    fn compact_page(&self, id: PageId) -> DiskResult<bool> {
        let mut guard = self.state.write().unwrap();
        Ok(matches!(
            Self::compact_one(&mut guard, id)?,
            CompactedOutcome::Compacted
        ))
    }

    fn compact_range(&self, range: Range<u32>) -> DiskResult<CompactionStats> {
        let mut guard = self.state.write().unwrap();
        let mut stats = CompactionStats::default();
        for raw_id in range {
            if raw_id >= guard.next_page_id {
                continue;
            }
            stats.pages_scanned += 1;
            match Self::compact_one(&mut guard, PageId::new(raw_id)) {
                Ok(CompactedOutcome::Compacted) => stats.pages_compacted += 1,
                Ok(CompactedOutcome::Unchanged) => {}
                Ok(CompactedOutcome::SkippedNonData) => stats.pages_skipped_non_data += 1,
                Err(e) => {
                    warn!(page = raw_id, error = %e, "compaction sweep failed on page");
                    stats.pages_failed += 1;
                }
            }
        }
        Ok(stats)
    }

    fn scan_for_compaction(&self) -> DiskResult<CompactionStats> {
        let next = {
            let guard = self.state.read().unwrap();
            guard.next_page_id
        };
        self.compact_range(0..next)
    }
}

fn pop_free_list(state: &mut State) -> DiskResult<Option<PageId>> {
    let Some(head_id) = state.free_list.head() else {
        return Ok(None);
    };
    let mut head_page = MappedDiskManager::raw_read(state, head_id)?;
    let (count, next) = {
        let payload = head_page.payload_mut();
        let mut fl = freelist::FreeListPage::open(payload);
        (fl.count()?, fl.next()?)
    };
    if count > 0 {
        let popped = {
            let payload = head_page.payload_mut();
            let mut fl = freelist::FreeListPage::open(payload);
            fl.pop_entry()?
        };
        MappedDiskManager::raw_write(state, &head_page)?;
        Ok(Some(PageId::new(popped)))
    } else {
        state.free_list = freelist::FreeListDescriptor::from_parts(
            next.map(PageId::new),
            state.free_list.page_count().saturating_sub(1),
        );
        Ok(Some(head_id))
    }
}

fn push_free_list(state: &mut State, id: PageId) -> DiskResult<()> {
    match state.free_list.head() {
        None => {
            let head_id = PageId::new(state.next_page_id);
            state.next_page_id += 1;
            let mut page = Page::new(head_id, PageType::FreeList);
            {
                let payload = page.payload_mut();
                let mut fl = freelist::FreeListPage::open(payload);
                fl.initialize();
                fl.push_entry(id.as_u32())?;
            }
            MappedDiskManager::raw_write(state, &page)?;
            state.free_list =
                freelist::FreeListDescriptor::from_parts(Some(head_id), state.free_list.page_count() + 1);
        }
        Some(head_id) => {
            let mut head_page = MappedDiskManager::raw_read(state, head_id)?;
            let is_full = {
                let payload = head_page.payload_mut();
                freelist::FreeListPage::open(payload).is_full()?
            };
            if !is_full {
                {
                    let payload = head_page.payload_mut();
                    freelist::FreeListPage::open(payload).push_entry(id.as_u32())?;
                }
                MappedDiskManager::raw_write(state, &head_page)?;
            } else {
                let mut new_head = Page::new(id, PageType::FreeList);
                {
                    let payload = new_head.payload_mut();
                    let mut fl = freelist::FreeListPage::open(payload);
                    fl.initialize();
                    fl.set_next(Some(head_id.as_u32()))?;
                }
                MappedDiskManager::raw_write(state, &new_head)?;
                state.free_list = freelist::FreeListDescriptor::from_parts(
                    Some(id),
                    state.free_list.page_count() + 1,
                );
            }
        }
    }
    Ok(())
}

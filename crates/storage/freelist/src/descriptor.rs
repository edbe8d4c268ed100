//! The in-memory handle onto the on-disk chain of `FreeList`-typed pages.

use crate::errors::FreeListResult;
use crate::page_io::PageIo;
use crate::page_view::FreeListPage;
use page::{Page, PageId, PageType};
use tracing::trace;

/// In-memory descriptor for the on-disk free-page chain.
///
/// The chain is a LIFO stack of `FreeList`-typed pages, each holding a
/// packed array of reusable page identifiers plus a pointer to the next
/// page in the chain. `push` and `pop` are the only operations; neither
/// allocates from, nor returns to, the monotonic page-id counter except in
/// the two documented edge cases below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FreeListDescriptor {
    head: Option<PageId>,
    /// Number of pages currently spent on free-list bookkeeping (the chain's
    /// own structural pages, not the entries they hold).
    page_count: u32,
}

impl FreeListDescriptor {
    /// An empty free list: nothing has ever been deallocated.
    pub fn empty() -> Self {
        Self {
            head: None,
            page_count: 0,
        }
    }

    /// Reconstructs a descriptor from persisted metadata (used on recovery).
    pub fn from_parts(head: Option<PageId>, page_count: u32) -> Self {
        Self { head, page_count }
    }

    /// The chain's current head page, if any.
    pub fn head(&self) -> Option<PageId> {
        self.head
    }

    /// Number of pages currently spent on chain bookkeeping.
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Returns a reusable page id without consuming it from the chain, if
    /// one is available without reading from disk. Always `None` here since
    /// inspecting requires a read; kept for symmetry with callers that only
    /// want to know whether the list is non-empty.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Pushes `id` onto the free list, making it eligible for reuse by a
    /// future [`Self::pop`].
    ///
    /// When the list is empty, a fresh head-list-page is carved out using
    /// `next_id_counter` (which is incremented): that page becomes
    /// permanent chain bookkeeping and is never itself returned by `pop`.
    /// When the current head page is full, `id` itself is re-purposed as
    /// the new head-list-page (its `next` pointer set to the old head) so
    /// the chain's own storage overhead stays bounded instead of growing by
    /// drawing a fresh identifier on every head rollover.
    pub fn push<IO: PageIo>(
        &mut self,
        io: &IO,
        id: PageId,
        next_id_counter: &mut u32,
    ) -> FreeListResult<()> {
        match self.head {
            None => {
                let head_id = PageId::new(*next_id_counter);
                *next_id_counter += 1;
                let mut page = Page::new(head_id, PageType::FreeList);
                {
                    let mut fl = FreeListPage::open(page.payload_mut());
                    fl.initialize();
                    fl.push_entry(id.as_u32())?;
                }
                io.write_raw(&page)?;
                self.head = Some(head_id);
                self.page_count += 1;
                trace!(head = %head_id, pushed = %id, "free list: opened new head page");
            }
            Some(head_id) => {
                let mut page = io.read_raw(head_id)?;
                let is_full = {
                    let fl = FreeListPage::open(page.payload_mut());
                    fl.is_full()?
                };
                if !is_full {
                    let mut fl = FreeListPage::open(page.payload_mut());
                    fl.push_entry(id.as_u32())?;
                    io.write_raw(&page)?;
                    trace!(head = %head_id, pushed = %id, "free list: appended entry");
                } else {
                    let mut new_head = Page::new(id, PageType::FreeList);
                    {
                        let mut fl = FreeListPage::open(new_head.payload_mut());
                        fl.initialize();
                        fl.set_next(Some(head_id.as_u32()))?;
                    }
                    io.write_raw(&new_head)?;
                    self.head = Some(id);
                    self.page_count += 1;
                    trace!(new_head = %id, old_head = %head_id, "free list: head full, repurposed freed page as new head");
                }
            }
        }
        Ok(())
    }

    /// Pops a reusable page id from the free list, or `None` if it is
    /// empty (the caller should then draw a fresh id from its own
    /// monotonic counter).
    ///
    /// When the head page's entry array is drained to zero, the head page
    /// itself becomes the returned identifier and the chain advances to
    /// the page it pointed to next.
    pub fn pop<IO: PageIo>(&mut self, io: &IO) -> FreeListResult<Option<PageId>> {
        let Some(head_id) = self.head else {
            return Ok(None);
        };
        let mut page = io.read_raw(head_id)?;
        let (count, next) = {
            let fl = FreeListPage::open(page.payload_mut());
            (fl.count()?, fl.next()?)
        };
        if count > 0 {
            let popped = {
                let mut fl = FreeListPage::open(page.payload_mut());
                fl.pop_entry()?
            };
            io.write_raw(&page)?;
            trace!(head = %head_id, popped, "free list: popped entry");
            Ok(Some(PageId::new(popped)))
        } else {
            self.head = next.map(PageId::new);
            self.page_count = self.page_count.saturating_sub(1);
            trace!(returned = %head_id, new_head = ?self.head, "free list: head page drained, advancing chain");
            Ok(Some(head_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct MemIo {
        pages: RefCell<HashMap<u32, Page>>,
    }

    impl MemIo {
        fn new() -> Self {
            Self {
                pages: RefCell::new(HashMap::new()),
            }
        }
    }

    impl PageIo for MemIo {
        fn read_raw(&self, id: PageId) -> FreeListResult<Page> {
            Ok(self
                .pages
                .borrow()
                .get(&id.as_u32())
                .cloned()
                .unwrap_or_else(|| Page::new(id, PageType::FreeList)))
        }

        fn write_raw(&self, page: &Page) -> FreeListResult<()> {
            self.pages
                .borrow_mut()
                .insert(page.id().as_u32(), page.clone());
            Ok(())
        }
    }

    #[test]
    fn push_then_pop_returns_same_id() {
        let io = MemIo::new();
        let mut counter = 100u32;
        let mut list = FreeListDescriptor::empty();
        assert!(list.is_empty());

        list.push(&io, PageId::new(5), &mut counter).unwrap();
        assert!(!list.is_empty());
        // pushing the first entry onto an empty list consumes one fresh id
        // from the counter to host the new head page.
        assert_eq!(counter, 101);

        let popped = list.pop(&io, ).unwrap();
        assert_eq!(popped, Some(PageId::new(5)));
    }

    #[test]
    fn pop_on_empty_list_returns_none() {
        let io = MemIo::new();
        let list = FreeListDescriptor::empty();
        let mut list = list;
        assert_eq!(list.pop(&io).unwrap(), None);
    }

    #[test]
    fn lifo_ordering_across_multiple_pushes() {
        let io = MemIo::new();
        let mut counter = 1000u32;
        let mut list = FreeListDescriptor::empty();
        for id in [1u32, 2, 3] {
            list.push(&io, PageId::new(id), &mut counter).unwrap();
        }
        assert_eq!(list.pop(&io).unwrap(), Some(PageId::new(3)));
        assert_eq!(list.pop(&io).unwrap(), Some(PageId::new(2)));
        assert_eq!(list.pop(&io).unwrap(), Some(PageId::new(1)));
        assert_eq!(list.pop(&io).unwrap(), None);
    }

    #[test]
    fn head_rollover_repurposes_freed_page_instead_of_drawing_fresh_id() {
        let io = MemIo::new();
        let mut counter = 1u32;
        let mut list = FreeListDescriptor::empty();

        // Fill the head page to capacity, pushing ordinary entries (ids far
        // away from the counter so they can't collide with it).
        list.push(&io, PageId::new(5_000), &mut counter).unwrap();
        let head_after_open = list.head().unwrap();
        for i in 0..(crate::page_view::CAPACITY as u32 - 1) {
            list.push(&io, PageId::new(6_000 + i), &mut counter).unwrap();
        }
        let counter_before_rollover = counter;

        // One more push must overflow the head page: the incoming id itself
        // becomes the new head, no fresh id drawn from the counter.
        list.push(&io, PageId::new(42), &mut counter).unwrap();
        assert_eq!(counter, counter_before_rollover);
        assert_eq!(list.head(), Some(PageId::new(42)));

        // Popping now drains the (empty) new head first, returning it, then
        // exposes the previous head's remaining entries.
        assert_eq!(list.pop(&io).unwrap(), Some(PageId::new(42)));
        assert_eq!(list.head(), Some(head_after_open));
    }
}

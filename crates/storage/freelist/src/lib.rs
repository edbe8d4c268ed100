//! The on-disk chain of reusable page identifiers.
//!
//! Deallocating a page never shrinks the file; instead its id is pushed
//! onto a LIFO chain of `FreeList`-typed pages so a later allocation can
//! reuse it before the monotonic page-id counter is advanced. See
//! [`descriptor::FreeListDescriptor`] for the push/pop policy.

#![forbid(unsafe_code)]

/// Errors produced by free-list operations.
pub mod errors;
/// The free-list descriptor and its push/pop policy.
pub mod descriptor;
/// The narrow page-I/O trait the descriptor needs from its host.
pub mod page_io;
/// The on-disk layout of a single free-list page's payload.
pub mod page_view;

pub use descriptor::FreeListDescriptor;
pub use errors::{FreeListError, FreeListResult};
pub use page_io::PageIo;
pub use page_view::{FreeListPage, CAPACITY as FREE_LIST_CAPACITY};

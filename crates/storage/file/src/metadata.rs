//! Durable persistence of the free-list chain's head across restarts.
//!
//! The monotonic page-id counter is never itself persisted: it is
//! reconstructed on every open as `⌊file_size / PAGE_SIZE⌋`, so page 0 stays
//! an ordinary allocatable data page rather than a reserved slot. Only the
//! free-list chain's head and its bookkeeping-page count need a durable
//! home, since neither is recoverable from the file's size alone; they live
//! in a small sidecar file next to the data file.

use crate::errors::DiskResult;
use binary_helpers::le::{read_le, write_le};
use freelist::FreeListDescriptor;
use page::PageId;
use std::path::{Path, PathBuf};

const SIDECAR_LEN: usize = 12;

/// The free-list sidecar path for a data file at `data_path`.
pub fn sidecar_path(data_path: &Path) -> PathBuf {
    let mut os = data_path.as_os_str().to_os_string();
    os.push(".flmeta");
    PathBuf::from(os)
}

/// Loads the free-list descriptor from `path`. A missing sidecar (a brand
/// new data file, or one nothing has ever been deallocated from) decodes as
/// an empty free list.
pub fn load_free_list(path: &Path) -> DiskResult<FreeListDescriptor> {
    match std::fs::read(path) {
        Ok(bytes) => decode(&bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FreeListDescriptor::empty()),
        Err(e) => Err(e.into()),
    }
}

/// Persists `free_list` to `path`, overwriting any previous contents.
pub fn store_free_list(path: &Path, free_list: &FreeListDescriptor) -> DiskResult<()> {
    std::fs::write(path, encode(free_list))?;
    Ok(())
}

fn decode(bytes: &[u8]) -> DiskResult<FreeListDescriptor> {
    if bytes.len() < SIDECAR_LEN {
        return Ok(FreeListDescriptor::empty());
    }
    // A dedicated presence flag, not "head id == 0", marks "no head": page 0
    // is an ordinary allocatable page now and can legitimately become one.
    let head_present = read_le::<u32>(bytes, 0)?;
    let raw_head = read_le::<u32>(bytes, 4)?;
    let page_count = read_le::<u32>(bytes, 8)?;
    let head = (head_present != 0).then(|| PageId::new(raw_head));
    Ok(FreeListDescriptor::from_parts(head, page_count))
}

fn encode(free_list: &FreeListDescriptor) -> [u8; SIDECAR_LEN] {
    let mut buf = [0u8; SIDECAR_LEN];
    let head_present: u32 = if free_list.head().is_some() { 1 } else { 0 };
    write_le(&mut buf, 0, head_present).expect("buffer sized for layout");
    write_le(&mut buf, 4, free_list.head().map(PageId::as_u32).unwrap_or(0)).expect("buffer sized for layout");
    write_le(&mut buf, 8, free_list.page_count()).expect("buffer sized for layout");
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sidecar_decodes_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let free_list = load_free_list(&dir.path().join("absent.flmeta")).unwrap();
        assert!(free_list.is_empty());
    }

    #[test]
    fn round_trips_a_head_at_page_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = sidecar_path(&dir.path().join("data.db"));
        let original = FreeListDescriptor::from_parts(Some(PageId::new(0)), 1);
        store_free_list(&path, &original).unwrap();
        let decoded = load_free_list(&path).unwrap();
        assert_eq!(decoded.head(), Some(PageId::new(0)));
        assert_eq!(decoded.page_count(), 1);
    }

    #[test]
    fn round_trips_an_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = sidecar_path(&dir.path().join("data.db"));
        store_free_list(&path, &FreeListDescriptor::empty()).unwrap();
        let decoded = load_free_list(&path).unwrap();
        assert!(decoded.is_empty());
    }
}

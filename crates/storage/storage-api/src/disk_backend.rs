//! Tagged-enum polymorphism over the two disk-manager implementations and
//! the two write-ahead-log flavors.
//!
//! Both `DiskManager::close` and `Wal`/`WalCodec::close` consume `self` by
//! value, which rules out trait objects (`dyn DiskManager` is not object
//! safe with a `where Self: Sized` method). A small tagged enum gets the
//! same "pick one implementation at runtime" behavior without it.

use codec::{CodecError, PageCodec, PageCodecConfig, WalCodec, WalCodecConfig};
use file::errors::DiskResult;
use file::manager::{CompactionStats, DiskManager, DiskStats};
use file::{MappedDiskManager, PositionalDiskManager};
use page::{Page, PageId};
use std::ops::Range;
use std::path::Path;
use wal::{WalError, WalRecord, WalResult};

/// `WalCodec`'s methods return `CodecResult`; this maps that back onto
/// `WalResult` without an orphan `From` impl (neither type is local here).
fn codec_err_to_wal(e: CodecError) -> WalError {
    match e {
        CodecError::Io(e) => WalError::Io(e),
        other => WalError::Corruption(other.to_string()),
    }
}

/// Either disk-manager implementation, always wrapped in a [`PageCodec`] so
/// the disabled-sentinel envelope is present from the first byte ever
/// written, codec enabled or not.
#[derive(Debug)]
pub enum AnyDiskManager {
    /// Positional (`pread`/`pwrite`) I/O.
    Positional(PageCodec<PositionalDiskManager>),
    /// Memory-mapped I/O.
    Mapped(PageCodec<MappedDiskManager>),
}

impl AnyDiskManager {
    /// Opens the positional variant at `path`.
    pub fn open_positional<P: AsRef<Path>>(path: P, config: PageCodecConfig) -> DiskResult<Self> {
        let inner = PositionalDiskManager::open(path)?;
        Ok(Self::Positional(PageCodec::new(inner, config)))
    }

    /// Opens the memory-mapped variant at `path`.
    pub fn open_mapped<P: AsRef<Path>>(path: P, config: PageCodecConfig) -> DiskResult<Self> {
        let inner = MappedDiskManager::open(path)?;
        Ok(Self::Mapped(PageCodec::new(inner, config)))
    }
}

impl DiskManager for AnyDiskManager {
    fn allocate_page(&self) -> DiskResult<PageId> {
        match self {
            Self::Positional(d) => d.allocate_page(),
            Self::Mapped(d) => d.allocate_page(),
        }
    }

    fn deallocate_page(&self, id: PageId) -> DiskResult<()> {
        match self {
            Self::Positional(d) => d.deallocate_page(id),
            Self::Mapped(d) => d.deallocate_page(id),
        }
    }

    fn read_page(&self, id: PageId) -> DiskResult<Page> {
        match self {
            Self::Positional(d) => d.read_page(id),
            Self::Mapped(d) => d.read_page(id),
        }
    }

    fn write_page(&self, page: &Page) -> DiskResult<()> {
        match self {
            Self::Positional(d) => d.write_page(page),
            Self::Mapped(d) => d.write_page(page),
        }
    }

    fn sync(&self) -> DiskResult<()> {
        match self {
            Self::Positional(d) => d.sync(),
            Self::Mapped(d) => d.sync(),
        }
    }

    fn close(self) -> DiskResult<()> {
        match self {
            Self::Positional(d) => d.close(),
            Self::Mapped(d) => d.close(),
        }
    }

    fn stats(&self) -> DiskStats {
        match self {
            Self::Positional(d) => d.stats(),
            Self::Mapped(d) => d.stats(),
        }
    }

    fn compact_page(&self, id: PageId) -> DiskResult<bool> {
        match self {
            Self::Positional(d) => d.compact_page(id),
            Self::Mapped(d) => d.compact_page(id),
        }
    }

    fn compact_range(&self, range: Range<u32>) -> DiskResult<CompactionStats> {
        match self {
            Self::Positional(d) => d.compact_range(range),
            Self::Mapped(d) => d.compact_range(range),
        }
    }

    fn scan_for_compaction(&self) -> DiskResult<CompactionStats> {
        match self {
            Self::Positional(d) => d.scan_for_compaction(),
            Self::Mapped(d) => d.scan_for_compaction(),
        }
    }
}

/// The write-ahead log, always wrapped in a [`WalCodec`] for the same
/// always-wrap reasoning as [`AnyDiskManager`].
#[derive(Debug)]
pub struct AnyWal(WalCodec);

impl AnyWal {
    /// Opens (creating if absent) the log file at `path`.
    pub fn open<P: AsRef<Path>>(path: P, config: WalCodecConfig) -> WalResult<Self> {
        Ok(Self(WalCodec::open(path, config).map_err(codec_err_to_wal)?))
    }

    /// Appends `record`, assigning it the next LSN.
    pub fn append(&self, record: WalRecord) -> WalResult<u64> {
        self.0.append(record).map_err(codec_err_to_wal)
    }

    /// Flushes buffered writes to stable storage.
    pub fn flush(&self) -> WalResult<()> {
        self.0.flush().map_err(codec_err_to_wal)
    }

    /// Appends and flushes a checkpoint marker.
    pub fn checkpoint(&self) -> WalResult<u64> {
        self.0.checkpoint().map_err(codec_err_to_wal)
    }

    /// Replays every record, decrypting each as needed.
    pub fn replay(&self) -> WalResult<Vec<WalRecord>> {
        self.0.replay().map_err(codec_err_to_wal)
    }

    /// Flushes and releases the log file.
    pub fn close(self) -> WalResult<()> {
        self.0.close().map_err(codec_err_to_wal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use page::{Page, PageType};
    use wal::WalRecordType;

    #[test]
    fn positional_variant_round_trips_a_page() {
        let dir = tempfile::tempdir().unwrap();
        let disk = AnyDiskManager::open_positional(dir.path().join("data.db"), PageCodecConfig::disabled()).unwrap();
        let id = disk.allocate_page().unwrap();
        let mut page = Page::new(id, PageType::Data);
        page.payload_mut()[..4].copy_from_slice(b"abcd");
        disk.write_page(&page).unwrap();
        assert_eq!(&disk.read_page(id).unwrap().payload()[..4], b"abcd");
    }

    #[test]
    fn mapped_variant_round_trips_a_page() {
        let dir = tempfile::tempdir().unwrap();
        let disk = AnyDiskManager::open_mapped(dir.path().join("data.db"), PageCodecConfig::disabled()).unwrap();
        let id = disk.allocate_page().unwrap();
        let mut page = Page::new(id, PageType::Data);
        page.payload_mut()[..4].copy_from_slice(b"wxyz");
        disk.write_page(&page).unwrap();
        assert_eq!(&disk.read_page(id).unwrap().payload()[..4], b"wxyz");
    }

    #[test]
    fn any_wal_append_and_replay_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let wal = AnyWal::open(dir.path().join("wal.log"), WalCodecConfig::disabled()).unwrap();
        wal.append(WalRecord::new(WalRecordType::Insert, 1, 2, 0, b"payload".to_vec())).unwrap();
        wal.flush().unwrap();
        let records = wal.replay().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data, b"payload");
    }
}

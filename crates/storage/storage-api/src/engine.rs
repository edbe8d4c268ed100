//! The storage engine: composes a disk manager, buffer pool, and
//! write-ahead log into a single crash-recoverable unit.

use crate::config::{CodecConfig, DiskManagerKind, EngineConfig};
use crate::disk_backend::{AnyDiskManager, AnyWal};
use crate::errors::{EngineError, EngineResult};
use buffer::{BufferPool, BufferPoolStats, PagePin};
use codec::{PageCodecConfig, WalCodecConfig};
use page::PageId;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use wal::{WalRecord, WalRecordType};

const DEFAULT_BUFFER_PAGES: usize = 1000;

fn page_codec_config(data_dir: &Path, config: &CodecConfig) -> EngineResult<PageCodecConfig> {
    let (encryption, key) = crate::config::resolve_encryption(data_dir, &config.encryption)?;
    Ok(PageCodecConfig {
        compression: (&config.compression).into(),
        encryption,
        key,
    })
}

fn wal_codec_config(data_dir: &Path, config: &CodecConfig) -> EngineResult<WalCodecConfig> {
    let (encryption, key) = crate::config::resolve_encryption(data_dir, &config.encryption)?;
    Ok(WalCodecConfig { encryption, key })
}

/// The top-level storage engine: a disk manager, buffer pool, and
/// write-ahead log under one data directory, with crash recovery.
#[derive(Debug)]
pub struct StorageEngine {
    buffer: BufferPool<AnyDiskManager>,
    wal: AnyWal,
}

impl StorageEngine {
    /// Opens (creating if absent) the engine's data file and log file under
    /// `config.storage.data_dir`, then runs recovery.
    #[instrument(skip(config))]
    pub fn open(config: &EngineConfig) -> EngineResult<Self> {
        let storage = &config.storage;
        std::fs::create_dir_all(&storage.data_dir)?;

        let page_config = page_codec_config(&storage.data_dir, &storage.codec)?;
        let wal_config = wal_codec_config(&storage.data_dir, &storage.codec)?;

        let data_path = storage.data_dir.join("data.db");
        let disk = match storage.disk_manager {
            DiskManagerKind::Positional => AnyDiskManager::open_positional(&data_path, page_config)?,
            DiskManagerKind::Mapped => AnyDiskManager::open_mapped(&data_path, page_config)?,
        };

        let wal_path = storage.data_dir.join("wal.log");
        let wal = AnyWal::open(&wal_path, wal_config)?;

        let buffer = BufferPool::new(Arc::new(disk), storage.buffer_pages);
        let engine = Self { buffer, wal };
        engine.recover()?;
        info!(data_dir = %storage.data_dir.display(), "storage engine opened");
        Ok(engine)
    }

    /// Opens an engine with every default: positional I/O, no codec,
    /// [`DEFAULT_BUFFER_PAGES`] buffer frames.
    pub fn open_defaults(data_dir: impl AsRef<Path>) -> EngineResult<Self> {
        let config = EngineConfig {
            storage: crate::config::StorageConfig {
                data_dir: data_dir.as_ref().to_path_buf(),
                logs_dir: data_dir.as_ref().join("logs"),
                buffer_pages: NonZeroUsize::new(DEFAULT_BUFFER_PAGES).unwrap(),
                disk_manager: DiskManagerKind::Positional,
                codec: CodecConfig::default(),
            },
        };
        Self::open(&config)
    }

    /// Replays the write-ahead log, re-stamping each mutated page's LSN,
    /// then flushes every touched page back to disk. This is *LSN recovery*:
    /// it restores the durable LSN stamp a torn write may have lost, not a
    /// full payload redo (the higher MVCC layer is responsible for that).
    fn recover(&self) -> EngineResult<()> {
        let records = self.wal.replay()?;
        if records.is_empty() {
            return Ok(());
        }
        let mut replayed = 0u64;
        for record in &records {
            match record.record_type {
                WalRecordType::Insert | WalRecordType::Update | WalRecordType::Delete => {
                    let pin = self.buffer.fetch(PageId::new(record.page_id))?;
                    {
                        let mut page = pin.write();
                        if page.lsn() < record.lsn {
                            page.set_lsn(record.lsn);
                        }
                    }
                    self.buffer.unpin(pin.id(), true)?;
                    replayed += 1;
                }
                WalRecordType::Checkpoint | WalRecordType::Commit | WalRecordType::Abort => {}
            }
        }
        self.buffer.flush_all()?;
        info!(records = records.len(), replayed, "recovery replay complete");
        Ok(())
    }

    /// Fetches and pins a page, loading it from disk on a miss.
    pub fn fetch_page(&self, id: PageId) -> EngineResult<PagePin<'_, AnyDiskManager>> {
        Ok(self.buffer.fetch(id)?)
    }

    /// Allocates a fresh page and pins it as dirty.
    pub fn new_page(&self) -> EngineResult<PagePin<'_, AnyDiskManager>> {
        Ok(self.buffer.new_page()?)
    }

    /// Unpins a page previously obtained from [`StorageEngine::fetch_page`]
    /// or [`StorageEngine::new_page`].
    pub fn unpin(&self, id: PageId, dirty: bool) -> EngineResult<()> {
        Ok(self.buffer.unpin(id, dirty)?)
    }

    /// Appends a write-ahead log record ahead of the corresponding page
    /// mutation. Callers must log before calling `unpin(.., dirty=true)` to
    /// preserve the write-ahead property.
    pub fn log_operation(&self, record: WalRecord) -> EngineResult<u64> {
        Ok(self.wal.append(record)?)
    }

    /// Point-in-time buffer pool hit/miss/eviction counters.
    pub fn buffer_stats(&self) -> BufferPoolStats {
        self.buffer.stats()
    }

    /// Flushes every dirty page, appends a WAL checkpoint record, and syncs
    /// the disk manager.
    #[instrument(skip(self))]
    pub fn checkpoint(&self) -> EngineResult<()> {
        self.buffer.flush_all()?;
        self.wal.checkpoint()?;
        self.buffer.disk().sync()?;
        Ok(())
    }

    /// Flushes every dirty page, then closes the log and disk manager in
    /// that order.
    pub fn close(self) -> EngineResult<()> {
        if let Err(e) = self.buffer.flush_all() {
            warn!(error = %e, "flush_all failed during close, closing anyway");
        }
        self.wal.close()?;
        let disk = Arc::try_unwrap(self.buffer.into_disk()).map_err(|_| EngineError::Closed)?;
        disk.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wal::WalRecordType;

    #[test]
    fn open_write_checkpoint_close_reopen_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let engine = StorageEngine::open_defaults(dir.path()).unwrap();
            let pin = engine.new_page().unwrap();
            let id = pin.id();
            pin.write().payload_mut()[..5].copy_from_slice(b"howdy");
            drop(pin);
            engine.log_operation(WalRecord::new(WalRecordType::Insert, 1, id.as_u32(), 0, b"howdy".to_vec())).unwrap();
            engine.unpin(id, true).unwrap();
            engine.checkpoint().unwrap();
            engine.close().unwrap();
            id
        };

        let engine = StorageEngine::open_defaults(dir.path()).unwrap();
        let pin = engine.fetch_page(id).unwrap();
        assert_eq!(&pin.read().payload()[..5], b"howdy");
        drop(pin);
        engine.unpin(id, false).unwrap();
        engine.close().unwrap();
    }

    #[test]
    fn recovery_restamps_lsn_from_unflushed_wal_record() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let engine = StorageEngine::open_defaults(dir.path()).unwrap();
            // advance the lsn counter past zero so the real record below
            // claims a later lsn than the page's on-disk (zero) stamp.
            engine.log_operation(WalRecord::new(WalRecordType::Checkpoint, 0, 0, 0, Vec::new())).unwrap();

            let pin = engine.new_page().unwrap();
            let id = pin.id();
            drop(pin);
            engine.unpin(id, true).unwrap();
            // flush the page to disk with its original (zero) lsn, but log a
            // record claiming a later one, as if a crash happened between the
            // wal append and the next checkpoint's flush.
            engine.buffer.flush_all().unwrap();
            engine.log_operation(WalRecord::new(WalRecordType::Update, 1, id.as_u32(), 0, Vec::new())).unwrap();
            engine.wal.flush().unwrap();
            // dropped without calling close(): simulates a crash after the
            // wal append but before the disk manager's metadata persists
            id
        };

        let engine = StorageEngine::open_defaults(dir.path()).unwrap();
        let pin = engine.fetch_page(id).unwrap();
        assert!(pin.read().lsn() > 0);
        drop(pin);
        engine.unpin(id, false).unwrap();
        engine.close().unwrap();
    }

    #[test]
    fn buffer_stats_reflect_hits_and_misses() {
        let dir = tempfile::tempdir().unwrap();
        let engine = StorageEngine::open_defaults(dir.path()).unwrap();
        let pin = engine.new_page().unwrap();
        let id = pin.id();
        drop(pin);
        engine.unpin(id, true).unwrap();
        engine.buffer.flush_all().unwrap();
        let _pin = engine.fetch_page(id).unwrap();
        engine.unpin(id, false).unwrap();
        let stats = engine.buffer_stats();
        assert_eq!(stats.hits, 1);
    }
}

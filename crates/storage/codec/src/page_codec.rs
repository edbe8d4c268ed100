//! A [`DiskManager`] wrapper that transparently compresses and/or encrypts
//! a page's payload at rest. Header fields (page id, type, flags, LSN) are
//! always left in the clear so the layers above do not need to decode a
//! page just to know what it is.

use crate::compression::{self, CompressionAlgorithm};
use crate::encryption::{self, EncryptionAlgorithm, EncryptionKey};
use crate::errors::{CodecError, CodecResult};
use file::errors::DiskResult;
use file::manager::{CompactionStats, DiskManager, DiskStats};
use page::slotted::SlottedPage;
use page::{Page, PageId, PageType, PAYLOAD_SIZE};
use std::ops::Range;

/// Compression and encryption settings for a [`PageCodec`].
#[derive(Debug, Clone)]
pub struct PageCodecConfig {
    /// The compression algorithm new writes use.
    pub compression: CompressionAlgorithm,
    /// The encryption algorithm new writes use.
    pub encryption: EncryptionAlgorithm,
    /// The key used when `encryption` is not [`EncryptionAlgorithm::None`].
    pub key: Option<EncryptionKey>,
}

impl PageCodecConfig {
    /// A configuration with both compression and encryption disabled; the
    /// wrapper still writes passthrough envelopes, preserving migration
    /// tolerance if either is enabled later.
    pub fn disabled() -> Self {
        Self {
            compression: CompressionAlgorithm::None,
            encryption: EncryptionAlgorithm::None,
            key: None,
        }
    }
}

/// Wraps `D` so every page read/write goes through a compression-then-
/// encryption envelope confined to the page's payload region.
#[derive(Debug)]
pub struct PageCodec<D: DiskManager> {
    inner: D,
    config: PageCodecConfig,
}

impl<D: DiskManager> PageCodec<D> {
    /// Wraps `inner` with `config`.
    pub fn new(inner: D, config: PageCodecConfig) -> Self {
        Self { inner, config }
    }

    /// Returns the wrapped disk manager.
    pub fn into_inner(self) -> D {
        self.inner
    }

    fn encode_page(&self, page: &Page) -> CodecResult<Page> {
        let compressed = compression::encode_envelope(page.payload(), self.config.compression)?;
        let encrypted = encryption::encode_envelope(
            &compressed,
            self.config.encryption,
            self.config.key.as_ref(),
        )?;
        if encrypted.len() > PAYLOAD_SIZE {
            return Err(CodecError::EnvelopeTooLarge {
                needed: encrypted.len(),
                capacity: PAYLOAD_SIZE,
            });
        }
        let mut out = page.clone();
        let payload = out.payload_mut();
        payload.fill(0);
        payload[..encrypted.len()].copy_from_slice(&encrypted);
        Ok(out)
    }

    fn decode_page(&self, page: Page) -> CodecResult<Page> {
        let decrypted = encryption::decode_envelope(
            page.payload(),
            self.config.encryption,
            self.config.key.as_ref(),
        )?;
        let decompressed = compression::decode_envelope(&decrypted, self.config.compression)?;
        let mut out = page;
        let payload = out.payload_mut();
        payload.fill(0);
        let n = decompressed.len().min(PAYLOAD_SIZE);
        payload[..n].copy_from_slice(&decompressed[..n]);
        Ok(out)
    }

    fn compact_one(&self, id: PageId) -> DiskResult<bool> {
        let page = self.read_page(id)?;
        if page.page_type() != PageType::Data {
            return Ok(false);
        }
        let mut page = page;
        let needs = SlottedPage::open(page.payload_mut()).needs_compaction();
        if !needs {
            return Ok(false);
        }
        SlottedPage::open(page.payload_mut()).compact();
        self.write_page(&page)?;
        Ok(true)
    }
}

impl<D: DiskManager> DiskManager for PageCodec<D> {
    fn allocate_page(&self) -> DiskResult<PageId> {
        self.inner.allocate_page()
    }

    fn deallocate_page(&self, id: PageId) -> DiskResult<()> {
        self.inner.deallocate_page(id)
    }

    fn read_page(&self, id: PageId) -> DiskResult<Page> {
        let page = self.inner.read_page(id)?;
        Ok(self.decode_page(page)?)
    }

    fn write_page(&self, page: &Page) -> DiskResult<()> {
        let encoded = self.encode_page(page)?;
        self.inner.write_page(&encoded)
    }

    fn sync(&self) -> DiskResult<()> {
        self.inner.sync()
    }

    fn close(self) -> DiskResult<()>
    where
        Self: Sized,
    {
        self.inner.close()
    }

    fn stats(&self) -> DiskStats {
        self.inner.stats()
    }

    fn compact_page(&self, id: PageId) -> DiskResult<bool> {
        self.compact_one(id)
    }

    fn compact_range(&self, range: Range<u32>) -> DiskResult<CompactionStats> {
        let mut stats = CompactionStats::default();
        let next = self.inner.stats().next_page_id;
        for raw_id in range {
            if raw_id >= next {
                continue;
            }
            stats.pages_scanned += 1;
            match self.compact_one(PageId::new(raw_id)) {
                Ok(true) => stats.pages_compacted += 1,
                Ok(false) => {}
                Err(_) => stats.pages_failed += 1,
            }
        }
        Ok(stats)
    }

    fn scan_for_compaction(&self) -> DiskResult<CompactionStats> {
        let next = self.inner.stats().next_page_id;
        self.compact_range(0..next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use file::positional::PositionalDiskManager;

    fn codec(config: PageCodecConfig) -> (tempfile::TempDir, PageCodec<PositionalDiskManager>) {
        let dir = tempfile::tempdir().unwrap();
        let inner = PositionalDiskManager::open(dir.path().join("data.db")).unwrap();
        (dir, PageCodec::new(inner, config))
    }

    #[test]
    fn disabled_config_round_trips_unchanged() {
        let (_dir, codec) = codec(PageCodecConfig::disabled());
        let id = codec.allocate_page().unwrap();
        let mut page = Page::new(id, PageType::Data);
        page.payload_mut()[..5].copy_from_slice(b"howdy");
        codec.write_page(&page).unwrap();
        let read_back = codec.read_page(id).unwrap();
        assert_eq!(&read_back.payload()[..5], b"howdy");
    }

    #[test]
    fn compressed_and_encrypted_round_trips() {
        let config = PageCodecConfig {
            compression: CompressionAlgorithm::Zstd(3),
            encryption: EncryptionAlgorithm::Aes256Gcm,
            key: Some(EncryptionKey([3u8; 32])),
        };
        let (_dir, codec) = codec(config);
        let id = codec.allocate_page().unwrap();
        let mut page = Page::new(id, PageType::Data);
        page.payload_mut()[..11].copy_from_slice(b"secret data");
        codec.write_page(&page).unwrap();
        let read_back = codec.read_page(id).unwrap();
        assert_eq!(&read_back.payload()[..11], b"secret data");
        assert_eq!(read_back.id(), id);
    }

    #[test]
    fn migration_from_disabled_to_encrypted_still_reads_old_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        let id = {
            let inner = PositionalDiskManager::open(&path).unwrap();
            let codec = PageCodec::new(inner, PageCodecConfig::disabled());
            let id = codec.allocate_page().unwrap();
            let mut page = Page::new(id, PageType::Data);
            page.payload_mut()[..9].copy_from_slice(b"old-bytes");
            codec.write_page(&page).unwrap();
            id
        };

        let inner = PositionalDiskManager::open(&path).unwrap();
        let config = PageCodecConfig {
            compression: CompressionAlgorithm::None,
            encryption: EncryptionAlgorithm::Aes256Gcm,
            key: Some(EncryptionKey([9u8; 32])),
        };
        let codec = PageCodec::new(inner, config);
        let read_back = codec.read_page(id).unwrap();
        assert_eq!(&read_back.payload()[..9], b"old-bytes");
    }
}

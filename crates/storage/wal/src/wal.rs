//! The append-only write-ahead log file.

use crate::errors::WalResult;
use crate::record::{WalRecord, WalRecordType, WAL_HEADER_SIZE};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

struct State {
    file: File,
    next_lsn: u64,
}

/// An append-only log of [`WalRecord`]s. The next log-sequence number is
/// seeded from the file's length on open, so LSNs double as byte offsets
/// into the log.
#[derive(Debug)]
pub struct Wal {
    path: PathBuf,
    state: Mutex<State>,
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State").field("next_lsn", &self.next_lsn).finish()
    }
}

impl Wal {
    /// Opens (creating if absent) the log file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> WalResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;
        let next_lsn = file.metadata()?.len();
        debug!(next_lsn, path = %path.display(), "opened write-ahead log");
        Ok(Self {
            path,
            state: Mutex::new(State { file, next_lsn }),
        })
    }

    /// Appends `record`, assigning it the next LSN, and returns that LSN.
    /// Does not itself sync to stable storage; call [`Wal::flush`] for that.
    pub fn append(&self, mut record: WalRecord) -> WalResult<u64> {
        let mut state = self.state.lock().unwrap();
        let lsn = state.next_lsn;
        record.lsn = lsn;
        let bytes = record.encode()?;
        state.file.write_all(&bytes)?;
        state.next_lsn += bytes.len() as u64;
        Ok(lsn)
    }

    /// Flushes buffered writes to stable storage.
    pub fn flush(&self) -> WalResult<()> {
        let state = self.state.lock().unwrap();
        state.file.sync_all()?;
        Ok(())
    }

    /// Appends and flushes a [`WalRecordType::Checkpoint`] marker.
    pub fn checkpoint(&self) -> WalResult<u64> {
        let lsn = self.append(WalRecord::new(WalRecordType::Checkpoint, 0, 0, 0, Vec::new()))?;
        self.flush()?;
        Ok(lsn)
    }

    /// Reads every well-formed record from the start of the log. A
    /// truncated trailing record (a header or data chunk cut short by a
    /// crash mid-write) is dropped silently rather than treated as an
    /// error.
    pub fn replay(&self) -> WalResult<Vec<WalRecord>> {
        // Replay opens its own read handle so it never disturbs the append
        // file's position.
        let _guard = self.state.lock().unwrap();
        let mut file = File::open(&self.path)?;
        let mut records = Vec::new();
        loop {
            let mut header = [0u8; WAL_HEADER_SIZE];
            match file.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            let data_len = WalRecord::data_len_from_header(&header)?;
            let mut data = vec![0u8; data_len];
            match file.read_exact(&mut data) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    warn!("wal replay stopped at a truncated trailing record");
                    break;
                }
                Err(e) => return Err(e.into()),
            }
            records.push(WalRecord::decode(&header, data)?);
        }
        Ok(records)
    }

    /// Flushes and releases the log file.
    pub fn close(self) -> WalResult<()> {
        self.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_log() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wal.log");
        (dir, path)
    }

    #[test]
    fn append_assigns_increasing_lsns() {
        let (_dir, path) = temp_log();
        let wal = Wal::open(&path).unwrap();
        let a = wal
            .append(WalRecord::new(WalRecordType::Insert, 1, 2, 0, vec![1]))
            .unwrap();
        let b = wal
            .append(WalRecord::new(WalRecordType::Insert, 1, 2, a, vec![2, 2]))
            .unwrap();
        assert!(b > a);
    }

    #[test]
    fn replay_recovers_every_record_in_order() {
        let (_dir, path) = temp_log();
        let wal = Wal::open(&path).unwrap();
        for i in 0..5u8 {
            wal.append(WalRecord::new(WalRecordType::Insert, 1, i as u32, 0, vec![i]))
                .unwrap();
        }
        wal.flush().unwrap();

        let records = wal.replay().unwrap();
        assert_eq!(records.len(), 5);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.data, vec![i as u8]);
        }
    }

    #[test]
    fn replay_tolerates_truncated_tail() {
        let (_dir, path) = temp_log();
        {
            let wal = Wal::open(&path).unwrap();
            wal.append(WalRecord::new(WalRecordType::Insert, 1, 0, 0, vec![9, 9]))
                .unwrap();
            wal.flush().unwrap();
        }
        // simulate a crash mid-write: append a header with no data behind it
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            let mut partial = WalRecord::new(WalRecordType::Insert, 1, 1, 0, vec![1, 2, 3, 4]).encode().unwrap();
            partial.truncate(WAL_HEADER_SIZE + 2);
            file.write_all(&partial).unwrap();
        }

        let wal = Wal::open(&path).unwrap();
        let records = wal.replay().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data, vec![9, 9]);
    }

    #[test]
    fn checkpoint_appends_marker() {
        let (_dir, path) = temp_log();
        let wal = Wal::open(&path).unwrap();
        wal.checkpoint().unwrap();
        let records = wal.replay().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record_type, WalRecordType::Checkpoint);
    }
}

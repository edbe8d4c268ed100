//! The on-disk write-ahead log record format: a 33-byte header followed by
//! a variable-length data payload.
//!
//! ```text
//! offset  size  field
//! 0       8     lsn
//! 8       1     record_type
//! 9       8     txn_id
//! 17      4     page_id
//! 21      8     prev_lsn
//! 29      4     data_len
//! 33      ..    data
//! ```

use crate::errors::{WalError, WalResult};
use binary_helpers::le::{read_le, write_le};

/// Size of the fixed record header, in bytes.
pub const WAL_HEADER_SIZE: usize = 33;

/// The kind of operation a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalRecordType {
    /// A new record was inserted into a page.
    Insert = 0,
    /// An existing record was updated in place or relocated.
    Update = 1,
    /// A record was deleted from a page.
    Delete = 2,
    /// A checkpoint marker; carries no page mutation.
    Checkpoint = 3,
    /// A transaction committed.
    Commit = 4,
    /// A transaction aborted.
    Abort = 5,
}

impl TryFrom<u8> for WalRecordType {
    type Error = WalError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Insert),
            1 => Ok(Self::Update),
            2 => Ok(Self::Delete),
            3 => Ok(Self::Checkpoint),
            4 => Ok(Self::Commit),
            5 => Ok(Self::Abort),
            other => Err(WalError::Corruption(format!(
                "unknown wal record type tag {other}"
            ))),
        }
    }
}

impl From<WalRecordType> for u8 {
    fn from(value: WalRecordType) -> Self {
        value as u8
    }
}

/// A single write-ahead log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    /// This record's log-sequence number, assigned by [`crate::wal::Wal::append`].
    pub lsn: u64,
    /// What kind of operation this record describes.
    pub record_type: WalRecordType,
    /// The transaction this record belongs to.
    pub txn_id: u64,
    /// The page this record mutates. Zero for transaction/checkpoint markers.
    pub page_id: u32,
    /// The LSN of this transaction's previous record, for undo chaining.
    /// Zero if there is none.
    pub prev_lsn: u64,
    /// Operation-specific payload bytes (e.g. the inserted/updated tuple).
    pub data: Vec<u8>,
}

impl WalRecord {
    /// Builds a record with `lsn` left at zero; [`crate::wal::Wal::append`]
    /// assigns the real value before writing.
    pub fn new(
        record_type: WalRecordType,
        txn_id: u64,
        page_id: u32,
        prev_lsn: u64,
        data: Vec<u8>,
    ) -> Self {
        Self {
            lsn: 0,
            record_type,
            txn_id,
            page_id,
            prev_lsn,
            data,
        }
    }

    /// Serializes this record to its on-disk byte representation.
    pub fn encode(&self) -> WalResult<Vec<u8>> {
        let mut buf = vec![0u8; WAL_HEADER_SIZE + self.data.len()];
        write_le(&mut buf, 0, self.lsn)?;
        buf[8] = self.record_type.into();
        write_le(&mut buf, 9, self.txn_id)?;
        write_le(&mut buf, 17, self.page_id)?;
        write_le(&mut buf, 21, self.prev_lsn)?;
        write_le(&mut buf, 29, self.data.len() as u32)?;
        buf[WAL_HEADER_SIZE..].copy_from_slice(&self.data);
        Ok(buf)
    }

    /// Decodes a record from a header and its matching data slice.
    pub fn decode(header: &[u8; WAL_HEADER_SIZE], data: Vec<u8>) -> WalResult<Self> {
        let lsn = read_le::<u64>(header, 0)?;
        let record_type = WalRecordType::try_from(header[8])?;
        let txn_id = read_le::<u64>(header, 9)?;
        let page_id = read_le::<u32>(header, 17)?;
        let prev_lsn = read_le::<u64>(header, 21)?;
        Ok(Self {
            lsn,
            record_type,
            txn_id,
            page_id,
            prev_lsn,
            data,
        })
    }

    /// The `data_len` field as it would be encoded in the header.
    pub(crate) fn data_len_from_header(header: &[u8; WAL_HEADER_SIZE]) -> WalResult<usize> {
        Ok(read_le::<u32>(header, 29)? as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trips() {
        let mut record = WalRecord::new(WalRecordType::Update, 7, 42, 100, vec![1, 2, 3, 4]);
        record.lsn = 256;
        let bytes = record.encode().unwrap();
        assert_eq!(bytes.len(), WAL_HEADER_SIZE + 4);

        let header: [u8; WAL_HEADER_SIZE] = bytes[..WAL_HEADER_SIZE].try_into().unwrap();
        let data_len = WalRecord::data_len_from_header(&header).unwrap();
        assert_eq!(data_len, 4);
        let decoded = WalRecord::decode(&header, bytes[WAL_HEADER_SIZE..].to_vec()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn unknown_type_tag_is_corruption() {
        let mut header = [0u8; WAL_HEADER_SIZE];
        header[8] = 99;
        assert!(matches!(
            WalRecord::decode(&header, Vec::new()),
            Err(WalError::Corruption(_))
        ));
    }
}

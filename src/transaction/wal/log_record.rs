use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use bincode::{deserialize, serialize};

use crate::common::types::{Lsn, TxnId};
use crate::transaction::wal::error::{LogManagerError, Result};

/// Size of the length prefix in front of every encoded record
pub const FRAME_HEADER_SIZE: usize = 4;

/// Kinds of log records written by the transaction manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogRecordType {
    /// Marks the beginning of a transaction
    Begin,
    /// Marks the successful completion of a transaction
    Commit,
    /// Marks the rollback of a transaction
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Log Sequence Number - unique identifier for this log record
    pub lsn: Lsn,
    /// Transaction that generated this log record
    pub txn_id: TxnId,
    /// LSN of the previous log record of the same transaction
    pub prev_lsn: Option<Lsn>,
    pub record_type: LogRecordType,
}

impl LogRecord {
    pub fn new(lsn: Lsn, txn_id: TxnId, prev_lsn: Option<Lsn>, record_type: LogRecordType) -> Self {
        Self {
            lsn,
            txn_id,
            prev_lsn,
            record_type,
        }
    }

    /// Encode as a length-prefixed frame
    pub fn to_frame(&self) -> Result<Vec<u8>> {
        let body = serialize(self).map_err(|e| LogManagerError::SerializationError(e.to_string()))?;
        let mut frame = vec![0u8; FRAME_HEADER_SIZE];
        LittleEndian::write_u32(&mut frame, body.len() as u32);
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Decode one frame from the start of `bytes`.
    ///
    /// Returns the record and the number of bytes consumed, or `None` if
    /// `bytes` does not hold a whole frame.
    pub fn from_frame(bytes: &[u8]) -> Result<Option<(Self, usize)>> {
        if bytes.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }
        let body_len = LittleEndian::read_u32(&bytes[..FRAME_HEADER_SIZE]) as usize;
        let end = FRAME_HEADER_SIZE + body_len;
        if bytes.len() < end {
            return Ok(None);
        }
        let record = deserialize(&bytes[FRAME_HEADER_SIZE..end])
            .map_err(|e| LogManagerError::DeserializationError(e.to_string()))?;
        Ok(Some((record, end)))
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use log::{debug, info};
use parking_lot::Mutex;

use crate::common::types::{Lsn, TxnId};
use crate::storage::disk::DiskManager;
use crate::transaction::wal::error::{LogManagerError, Result};
use crate::transaction::wal::log_record::{LogRecord, LogRecordType};

/// Bytes fetched per `read_log` call when scanning the log file
const LOG_READ_CHUNK: usize = 4096;

/// Encoded records waiting for the next flush
#[derive(Default)]
struct LogBuffer {
    bytes: Vec<u8>,
    last_lsn: Option<Lsn>,
}

/// Buffers log records in memory and appends them to the log file on flush
pub struct LogManager {
    disk_manager: Arc<DiskManager>,
    next_lsn: AtomicU64,
    /// Highest LSN known to be on disk, 0 when none
    persistent_lsn: AtomicU64,
    buffer: Mutex<LogBuffer>,
}

impl LogManager {
    /// Create a log manager over the disk manager's log file, continuing the
    /// LSN sequence of any records already stored there
    pub fn new(disk_manager: Arc<DiskManager>) -> Result<Self> {
        let manager = Self {
            disk_manager,
            next_lsn: AtomicU64::new(1),
            persistent_lsn: AtomicU64::new(0),
            buffer: Mutex::new(LogBuffer::default()),
        };

        if let Some(last) = manager.read_log_records()?.last() {
            manager.next_lsn.store(last.lsn + 1, Ordering::SeqCst);
            manager.persistent_lsn.store(last.lsn, Ordering::SeqCst);
            info!("log {} resumes after lsn {}", manager.disk_manager.log_path().display(), last.lsn);
        }
        Ok(manager)
    }

    /// Append a record to the in-memory buffer and return its LSN
    pub fn add_log_to_buffer(
        &self,
        txn_id: TxnId,
        prev_lsn: Option<Lsn>,
        record_type: LogRecordType,
    ) -> Result<Lsn> {
        let mut buffer = self.buffer.lock();
        let lsn = self.next_lsn.fetch_add(1, Ordering::SeqCst);
        let frame = LogRecord::new(lsn, txn_id, prev_lsn, record_type).to_frame()?;

        buffer.bytes.extend_from_slice(&frame);
        buffer.last_lsn = Some(lsn);
        Ok(lsn)
    }

    /// Write every buffered record to the log file
    pub fn flush_log_to_disk(&self) -> Result<()> {
        let mut buffer = self.buffer.lock();
        if buffer.bytes.is_empty() {
            return Ok(());
        }

        self.disk_manager.write_log(&buffer.bytes)?;
        debug!("flushed {} log bytes", buffer.bytes.len());
        buffer.bytes.clear();
        if let Some(lsn) = buffer.last_lsn.take() {
            self.persistent_lsn.store(lsn, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Decode every record stored in the log file, oldest first
    pub fn read_log_records(&self) -> Result<Vec<LogRecord>> {
        let mut bytes = Vec::new();
        let mut chunk = vec![0u8; LOG_READ_CHUNK];
        let mut offset = 0u64;
        while let Some(n) = self.disk_manager.read_log(&mut chunk, offset)? {
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..n]);
            offset += n as u64;
        }

        let mut records = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            let Some((record, used)) = LogRecord::from_frame(&bytes[pos..])? else {
                return Err(LogManagerError::InvalidFormat(pos as u64));
            };
            records.push(record);
            pos += used;
        }
        Ok(records)
    }

    /// LSN the next record will receive
    pub fn next_lsn(&self) -> Lsn {
        self.next_lsn.load(Ordering::SeqCst)
    }

    pub fn persistent_lsn(&self) -> Option<Lsn> {
        match self.persistent_lsn.load(Ordering::SeqCst) {
            0 => None,
            lsn => Some(lsn),
        }
    }
}

use thiserror::Error;

use crate::common::types::{Fd, PageNo, Rid};
use crate::storage::buffer::BufferPoolError;
use crate::storage::disk::DiskManagerError;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Buffer pool error: {0}")]
    BufferPoolError(#[from] BufferPoolError),
    #[error("Disk manager error: {0}")]
    DiskManagerError(#[from] DiskManagerError),
    #[error("No free frame left in the buffer pool")]
    BufferPoolExhausted,
    #[error("Page {page_no} does not exist in fd {fd}")]
    PageNotExist { fd: Fd, page_no: PageNo },
    #[error("Record {0} does not exist")]
    RecordNotFound(Rid),
    #[error("Record {0} already exists")]
    RecordAlreadyExists(Rid),
    #[error("Record size mismatch: expected {expected} bytes, got {actual}")]
    RecordSizeMismatch { expected: usize, actual: usize },
    #[error("Invalid record size: {0}")]
    InvalidRecordSize(usize),
    #[error("Pages of fd {0} are still pinned")]
    FilePinned(Fd),
}

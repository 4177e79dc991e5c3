use thiserror::Error;
use crate::storage::disk::DiskManagerError;

#[derive(Error, Debug)]
pub enum BufferPoolError {
    #[error("Disk manager error: {0}")]
    DiskManagerError(#[from] DiskManagerError),
}

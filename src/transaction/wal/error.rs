use thiserror::Error;

use crate::storage::disk::DiskManagerError;

/// Error type for log manager operations
#[derive(Error, Debug)]
pub enum LogManagerError {
    #[error("Disk manager error: {0}")]
    DiskManagerError(#[from] DiskManagerError),

    #[error("Failed to serialize log record: {0}")]
    SerializationError(String),

    #[error("Failed to deserialize log record: {0}")]
    DeserializationError(String),

    #[error("Truncated log frame at offset {0}")]
    InvalidFormat(u64),
}

/// Result type for log manager operations
pub type Result<T> = std::result::Result<T, LogManagerError>;

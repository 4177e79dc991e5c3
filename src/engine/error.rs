use std::io;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::storage::disk::DiskManagerError;
use crate::storage::record::RecordError;
use crate::transaction::TransactionError;
use crate::transaction::wal::LogManagerError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Disk manager error: {0}")]
    DiskManagerError(#[from] DiskManagerError),

    #[error("Record error: {0}")]
    RecordError(#[from] RecordError),

    #[error("Catalog error: {0}")]
    CatalogError(#[from] CatalogError),

    #[error("Log manager error: {0}")]
    LogManagerError(#[from] LogManagerError),

    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

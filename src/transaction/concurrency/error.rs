use std::fmt;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::common::types::TxnId;
use crate::storage::record::RecordError;
use crate::transaction::wal::LogManagerError;

/// Why the lock manager refused a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The transaction already released a lock and may not acquire new ones
    LockOnShrinking,
    /// The request conflicts with the locks already granted
    DeadlockPrevention,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::LockOnShrinking => write!(f, "lock requested while shrinking"),
            AbortReason::DeadlockPrevention => write!(f, "lock conflict (no-wait)"),
        }
    }
}

/// A lock request failed and the transaction must be aborted
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Transaction {txn_id} must abort: {reason}")]
pub struct TransactionAbortError {
    pub txn_id: TxnId,
    pub reason: AbortReason,
}

impl TransactionAbortError {
    pub fn new(txn_id: TxnId, reason: AbortReason) -> Self {
        Self { txn_id, reason }
    }
}

/// Errors that can occur during transaction processing
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error(transparent)]
    Abort(#[from] TransactionAbortError),

    #[error("Record error: {0}")]
    RecordError(#[from] RecordError),

    #[error("Failed to write to the log: {0}")]
    LogError(#[from] LogManagerError),

    #[error("Catalog error: {0}")]
    CatalogError(#[from] CatalogError),

    #[error("Transaction {0} is not active")]
    InvalidState(TxnId),

    #[error("Transaction {0} is already active")]
    AlreadyActive(TxnId),
}

impl TransactionError {
    /// The abort reason, if this error came from the lock manager
    pub fn abort_reason(&self) -> Option<AbortReason> {
        match self {
            TransactionError::Abort(e) => Some(e.reason),
            _ => None,
        }
    }
}

/// Result type for transaction operations
pub type Result<T> = std::result::Result<T, TransactionError>;

// Transaction Management Module

pub mod concurrency;
pub mod wal;

// Public exports
pub use concurrency::{
    AbortReason, GroupLockMode, LockDataId, LockManager, Transaction, TransactionAbortError, TransactionError,
    TransactionManager, TransactionState, WriteRecord, WriteType,
};
pub use wal::{LogManager, LogRecord, LogRecordType};

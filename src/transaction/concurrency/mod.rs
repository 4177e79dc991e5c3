// Transaction concurrency module: two-phase locking and transaction lifecycle

pub mod error;
pub mod lock_manager;
pub mod transaction;
pub mod transaction_manager;

// Public exports
pub use error::{AbortReason, TransactionAbortError, TransactionError};
pub use lock_manager::{GroupLockMode, LockDataId, LockDataType, LockManager, LockMode};
pub use transaction::{Transaction, TransactionState, WriteRecord, WriteType};
pub use transaction_manager::TransactionManager;

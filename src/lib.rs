// QuarryDB storage and concurrency core

pub mod catalog;
pub mod common;
pub mod engine;
pub mod storage;
pub mod transaction;

// Re-export key items for convenient access
pub use common::config::EngineConfig;
pub use common::types::{Fd, PageId, PageNo, Rid, TxnId, PAGE_SIZE};
pub use engine::{EngineError, StorageEngine};
pub use storage::buffer::{BufferPoolError, BufferPoolManager, PageGuard};
pub use storage::disk::{DiskManager, DiskManagerError};
pub use storage::record::{RecordError, RecordFileHandle, RecordManager};
pub use transaction::{LockManager, Transaction, TransactionError, TransactionManager};

// Write-ahead log collaborator: transaction lifecycle records only

pub mod error;
pub mod log_manager;
pub mod log_record;

pub use error::LogManagerError;
pub use log_manager::LogManager;
pub use log_record::{LogRecord, LogRecordType};

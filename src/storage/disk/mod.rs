pub mod disk_manager;
pub mod error;

pub use disk_manager::DiskManager;
pub use error::DiskManagerError;

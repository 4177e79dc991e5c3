pub mod bitmap;
pub mod error;
pub mod file_handle;
pub mod layout;
pub mod manager;
pub mod scan;

pub use error::RecordError;
pub use file_handle::RecordFileHandle;
pub use layout::{RecordFileHeader, RecordPageHeader};
pub use manager::RecordManager;
pub use scan::RecordScan;

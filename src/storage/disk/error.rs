use std::path::PathBuf;
use thiserror::Error;

use crate::common::types::Fd;

#[derive(Error, Debug)]
pub enum DiskManagerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("File already exists: {}", .0.display())]
    FileExists(PathBuf),
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("File descriptor {0} is not open")]
    FileNotOpen(Fd),
    #[error("File is still open: {}", .0.display())]
    FileNotClosed(PathBuf),
}

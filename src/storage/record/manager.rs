use std::path::Path;
use std::sync::Arc;
use log::info;

use crate::common::types::{Fd, PAGE_SIZE, PageId};
use crate::storage::buffer::BufferPoolManager;
use crate::storage::disk::DiskManager;
use crate::storage::record::error::RecordError;
use crate::storage::record::file_handle::RecordFileHandle;
use crate::storage::record::layout::{RecordFileHeader, FILE_HDR_PAGE, FILE_HEADER_SIZE};

/// Creates, opens and closes record files
pub struct RecordManager {
    disk_manager: Arc<DiskManager>,
    buffer_pool: Arc<BufferPoolManager>,
}

impl RecordManager {
    pub fn new(disk_manager: Arc<DiskManager>, buffer_pool: Arc<BufferPoolManager>) -> Self {
        Self {
            disk_manager,
            buffer_pool,
        }
    }

    /// Create an empty record file whose header page describes `record_size`-byte records
    pub fn create_file(&self, path: impl AsRef<Path>, record_size: usize) -> Result<(), RecordError> {
        let path = path.as_ref();
        let header = RecordFileHeader::new(record_size)?;

        self.disk_manager.create_file(path)?;
        let fd = self.disk_manager.open_file(path)?;

        let mut page = [0u8; PAGE_SIZE];
        page[..FILE_HEADER_SIZE].copy_from_slice(&header.to_bytes());
        let written = self.disk_manager.write_page(fd, FILE_HDR_PAGE, &page);
        self.disk_manager.close_file(fd)?;
        written?;

        info!(
            "created record file {} ({} bytes per record, {} per page)",
            path.display(),
            record_size,
            header.num_records_per_page
        );
        Ok(())
    }

    pub fn destroy_file(&self, path: impl AsRef<Path>) -> Result<(), RecordError> {
        self.disk_manager.destroy_file(path)?;
        Ok(())
    }

    /// Open a record file, loading its header from page 0
    pub fn open_file(&self, path: impl AsRef<Path>) -> Result<RecordFileHandle, RecordError> {
        let fd = self.disk_manager.open_file(path)?;

        let header = match self.read_header(fd) {
            Ok(header) => header,
            Err(e) => {
                self.buffer_pool.delete_all_pages(fd)?;
                self.disk_manager.close_file(fd)?;
                return Err(e);
            }
        };
        self.disk_manager.set_page_count(fd, header.num_pages)?;

        Ok(RecordFileHandle::new(fd, Arc::clone(&self.buffer_pool), header))
    }

    fn read_header(&self, fd: Fd) -> Result<RecordFileHeader, RecordError> {
        let guard = self
            .buffer_pool
            .fetch_page(PageId::new(fd, FILE_HDR_PAGE))?
            .ok_or(RecordError::BufferPoolExhausted)?;
        let page = guard.read();
        RecordFileHeader::from_bytes(&page.data[..FILE_HEADER_SIZE])
    }

    /// Persist the header, write back and drop every cached page, then close the file.
    ///
    /// Fails with `FilePinned` while any page of the file is still pinned.
    pub fn close_file(&self, handle: &RecordFileHandle) -> Result<(), RecordError> {
        let fd = handle.fd();
        handle.flush_header()?;
        self.buffer_pool.flush_all_pages(fd)?;
        if !self.buffer_pool.delete_all_pages(fd)? {
            return Err(RecordError::FilePinned(fd));
        }
        self.disk_manager.close_file(fd)?;
        Ok(())
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPoolManager> {
        &self.buffer_pool
    }
}

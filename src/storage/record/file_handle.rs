use std::sync::Arc;
use log::debug;
use parking_lot::Mutex;

use crate::common::types::{Fd, PageId, PageNo, Rid};
use crate::storage::buffer::{BufferPoolManager, PageGuard};
use crate::storage::record::bitmap;
use crate::storage::record::error::RecordError;
use crate::storage::record::layout::{
    RecordFileHeader, RecordPageHeader, FILE_HDR_PAGE, FIRST_RECORD_PAGE, FILE_HEADER_SIZE,
};
use crate::storage::record::scan::RecordScan;

/// Fixed-size records stored in slotted pages of one file.
///
/// Pages are reached only through the buffer pool; no page stays pinned after
/// a call returns. Operations that touch the free-page chain hold the header
/// mutex for their whole duration.
pub struct RecordFileHandle {
    fd: Fd,
    bpm: Arc<BufferPoolManager>,
    header: Mutex<RecordFileHeader>,
}

impl RecordFileHandle {
    pub(crate) fn new(fd: Fd, bpm: Arc<BufferPoolManager>, header: RecordFileHeader) -> Self {
        Self {
            fd,
            bpm,
            header: Mutex::new(header),
        }
    }

    pub fn fd(&self) -> Fd {
        self.fd
    }

    /// Snapshot of the file header
    pub fn header(&self) -> RecordFileHeader {
        *self.header.lock()
    }

    pub fn record_size(&self) -> usize {
        self.header.lock().record_size()
    }

    /// Pages in the file, header page included
    pub fn num_pages(&self) -> PageNo {
        self.header.lock().num_pages
    }

    /// Copy out the record stored at `rid`
    pub fn get_record(&self, rid: &Rid) -> Result<Vec<u8>, RecordError> {
        let header = self.header();
        let guard = self.fetch_page_handle(&header, rid.page_no)?;
        let page = guard.read();

        if !Self::slot_occupied(&header, &page.data[..], rid) {
            return Err(RecordError::RecordNotFound(*rid));
        }
        Ok(page.data[header.slot_range(rid.slot_no)].to_vec())
    }

    pub fn is_record(&self, rid: &Rid) -> Result<bool, RecordError> {
        let header = self.header();
        let guard = self.fetch_page_handle(&header, rid.page_no)?;
        let page = guard.read();
        Ok(Self::slot_occupied(&header, &page.data[..], rid))
    }

    /// Store `buf` in the first free slot of the file and return its location
    pub fn insert_record(&self, buf: &[u8]) -> Result<Rid, RecordError> {
        self.insert_record_with(buf, |_| Ok(true))
    }

    /// Store `buf` in the first free slot that `reserve` accepts.
    ///
    /// Free slots are offered in free-chain order, each one before any byte
    /// is written to it. A slot that `reserve` turns down is skipped; when
    /// every slot of the chain is turned down a new page is appended. An
    /// error from `reserve` ends the insert with nothing written.
    pub fn insert_record_with<E, F>(&self, buf: &[u8], mut reserve: F) -> Result<Rid, E>
    where
        E: From<RecordError>,
        F: FnMut(Rid) -> Result<bool, E>,
    {
        let mut header = self.header.lock();
        Self::check_size(&header, buf)?;

        let mut candidate = header.first_free_page_no;
        let mut appending = false;
        loop {
            let mut guard = match candidate {
                Some(page_no) if !appending => self.fetch_page_handle(&header, page_no)?,
                _ => {
                    appending = true;
                    self.create_new_page_handle(&mut header)?
                }
            };
            let page_no = guard.page_id().page_no;

            let (placed, next_free) = {
                let mut page = guard.write();
                let data = &mut page.data[..];
                let mut page_hdr = RecordPageHeader::read_from(data);

                let mut chosen = None;
                let mut from = 0;
                while let Some(slot) =
                    bitmap::next_bit(false, &data[header.bitmap_range()], header.slots(), from)
                {
                    if reserve(Rid::new(page_no, slot as u32))? {
                        chosen = Some(slot as u32);
                        break;
                    }
                    from = slot + 1;
                }

                let placed = chosen.map(|slot_no| {
                    data[header.slot_range(slot_no)].copy_from_slice(buf);
                    bitmap::set(&mut data[header.bitmap_range()], slot_no as usize);
                    page_hdr.num_records += 1;
                    page_hdr.write_to(data);
                    (slot_no, page_hdr.num_records == header.num_records_per_page)
                });
                (placed, page_hdr.next_free_page_no)
            };
            drop(guard);

            match placed {
                Some((slot_no, became_full)) => {
                    if became_full {
                        self.unlink_free_page(&mut header, page_no, next_free)?;
                    }
                    return Ok(Rid::new(page_no, slot_no));
                }
                None => {
                    debug!("fd {}: no reservable slot on page {}", self.fd, page_no);
                    candidate = next_free;
                }
            }
        }
    }

    /// Store `buf` exactly at `rid`, which must be a free slot of an existing page
    pub fn insert_record_at(&self, rid: &Rid, buf: &[u8]) -> Result<(), RecordError> {
        let mut header = self.header.lock();
        Self::check_size(&header, buf)?;
        Self::check_slot(&header, rid)?;

        let became_full = {
            let mut guard = self.fetch_page_handle(&header, rid.page_no)?;
            let mut page = guard.write();
            let data = &mut page.data[..];

            if bitmap::is_set(&data[header.bitmap_range()], rid.slot_no as usize) {
                return Err(RecordError::RecordAlreadyExists(*rid));
            }
            let mut page_hdr = RecordPageHeader::read_from(data);
            data[header.slot_range(rid.slot_no)].copy_from_slice(buf);
            bitmap::set(&mut data[header.bitmap_range()], rid.slot_no as usize);
            page_hdr.num_records += 1;
            page_hdr.write_to(data);

            (page_hdr.num_records == header.num_records_per_page).then_some(page_hdr.next_free_page_no)
        };

        if let Some(next_free) = became_full {
            self.unlink_free_page(&mut header, rid.page_no, next_free)?;
        }
        Ok(())
    }

    /// Remove the record at `rid`
    pub fn delete_record(&self, rid: &Rid) -> Result<(), RecordError> {
        let mut header = self.header.lock();
        Self::check_slot(&header, rid)?;

        let mut guard = self.fetch_page_handle(&header, rid.page_no)?;
        let mut page = guard.write();
        let data = &mut page.data[..];

        if !bitmap::is_set(&data[header.bitmap_range()], rid.slot_no as usize) {
            return Err(RecordError::RecordNotFound(*rid));
        }
        let mut page_hdr = RecordPageHeader::read_from(data);
        bitmap::reset(&mut data[header.bitmap_range()], rid.slot_no as usize);
        page_hdr.num_records -= 1;

        // A full page regains a free slot: put it back at the head of the chain
        if page_hdr.num_records + 1 == header.num_records_per_page {
            page_hdr.next_free_page_no = header.first_free_page_no;
            header.first_free_page_no = Some(rid.page_no);
        }
        page_hdr.write_to(data);
        Ok(())
    }

    /// Overwrite the record at `rid` in place
    pub fn update_record(&self, rid: &Rid, buf: &[u8]) -> Result<(), RecordError> {
        let header = self.header();
        Self::check_size(&header, buf)?;

        let mut guard = self.fetch_page_handle(&header, rid.page_no)?;
        let mut page = guard.write();
        if !Self::slot_occupied(&header, &page.data[..], rid) {
            return Err(RecordError::RecordNotFound(*rid));
        }
        page.data[header.slot_range(rid.slot_no)].copy_from_slice(buf);
        Ok(())
    }

    /// Forward scan over every record of the file
    pub fn scan(&self) -> Result<RecordScan<'_>, RecordError> {
        RecordScan::new(self)
    }

    /// Persist the in-memory header into page 0 through the buffer pool
    pub fn flush_header(&self) -> Result<(), RecordError> {
        let header = self.header.lock();
        let mut guard = self
            .bpm
            .fetch_page(PageId::new(self.fd, FILE_HDR_PAGE))?
            .ok_or(RecordError::BufferPoolExhausted)?;
        guard.write().data[..FILE_HEADER_SIZE].copy_from_slice(&header.to_bytes());
        Ok(())
    }

    /// Pin record page `page_no`, which must lie inside the file
    pub(crate) fn fetch_page_handle(
        &self,
        header: &RecordFileHeader,
        page_no: PageNo,
    ) -> Result<PageGuard<'_>, RecordError> {
        if page_no < FIRST_RECORD_PAGE || page_no >= header.num_pages {
            return Err(RecordError::PageNotExist { fd: self.fd, page_no });
        }
        self.bpm
            .fetch_page(PageId::new(self.fd, page_no))?
            .ok_or(RecordError::BufferPoolExhausted)
    }

    fn create_new_page_handle(&self, header: &mut RecordFileHeader) -> Result<PageGuard<'_>, RecordError> {
        let mut guard = self
            .bpm
            .new_page(self.fd)?
            .ok_or(RecordError::BufferPoolExhausted)?;
        let page_no = guard.page_id().page_no;

        // The fresh page becomes the head of the free chain
        RecordPageHeader {
            next_free_page_no: header.first_free_page_no,
            num_records: 0,
        }
        .write_to(&mut guard.write().data[..]);

        header.num_pages = header.num_pages.max(page_no + 1);
        header.first_free_page_no = Some(page_no);
        debug!("fd {}: created record page {}", self.fd, page_no);
        Ok(guard)
    }

    /// Remove `page_no`, which just became full, from the free-page chain
    fn unlink_free_page(
        &self,
        header: &mut RecordFileHeader,
        page_no: PageNo,
        next_free: Option<PageNo>,
    ) -> Result<(), RecordError> {
        if header.first_free_page_no == Some(page_no) {
            header.first_free_page_no = next_free;
            return Ok(());
        }

        let mut current = header.first_free_page_no;
        while let Some(current_no) = current {
            let mut guard = self.fetch_page_handle(header, current_no)?;
            let mut page_hdr = RecordPageHeader::read_from(&guard.read().data[..]);
            if page_hdr.next_free_page_no == Some(page_no) {
                page_hdr.next_free_page_no = next_free;
                page_hdr.write_to(&mut guard.write().data[..]);
                return Ok(());
            }
            current = page_hdr.next_free_page_no;
        }
        Ok(())
    }

    fn slot_occupied(header: &RecordFileHeader, data: &[u8], rid: &Rid) -> bool {
        (rid.slot_no as usize) < header.slots()
            && bitmap::is_set(&data[header.bitmap_range()], rid.slot_no as usize)
    }

    fn check_slot(header: &RecordFileHeader, rid: &Rid) -> Result<(), RecordError> {
        if rid.slot_no as usize >= header.slots() {
            return Err(RecordError::RecordNotFound(*rid));
        }
        Ok(())
    }

    fn check_size(header: &RecordFileHeader, buf: &[u8]) -> Result<(), RecordError> {
        if buf.len() != header.record_size() {
            return Err(RecordError::RecordSizeMismatch {
                expected: header.record_size(),
                actual: buf.len(),
            });
        }
        Ok(())
    }
}

use crate::common::types::{NO_PAGE, PageNo, Rid};
use crate::storage::record::bitmap;
use crate::storage::record::error::RecordError;
use crate::storage::record::file_handle::RecordFileHandle;
use crate::storage::record::layout::FIRST_RECORD_PAGE;

/// Forward cursor over the occupied slots of a record file, in (page, slot) order.
///
/// The cursor holds no pins between steps. Records inserted behind the cursor
/// are not visited.
pub struct RecordScan<'a> {
    handle: &'a RecordFileHandle,
    rid: Rid,
}

impl<'a> RecordScan<'a> {
    /// Position the cursor on the first record, or at the end for an empty file
    pub fn new(handle: &'a RecordFileHandle) -> Result<Self, RecordError> {
        let mut scan = Self {
            handle,
            rid: Rid::new(FIRST_RECORD_PAGE, 0),
        };
        scan.seek(FIRST_RECORD_PAGE, 0)?;
        Ok(scan)
    }

    /// Move to the next occupied slot
    pub fn advance(&mut self) -> Result<(), RecordError> {
        if self.is_end() {
            return Ok(());
        }
        self.seek(self.rid.page_no, self.rid.slot_no as usize + 1)
    }

    pub fn is_end(&self) -> bool {
        self.rid.page_no == NO_PAGE
    }

    pub fn rid(&self) -> Rid {
        self.rid
    }

    pub fn restart(&mut self) -> Result<(), RecordError> {
        self.seek(FIRST_RECORD_PAGE, 0)
    }

    fn seek(&mut self, mut page_no: PageNo, mut from: usize) -> Result<(), RecordError> {
        let header = self.handle.header();

        while page_no < header.num_pages {
            let guard = self.handle.fetch_page_handle(&header, page_no)?;
            let page = guard.read();
            let found = bitmap::next_bit(true, &page.data[header.bitmap_range()], header.slots(), from);
            if let Some(slot_no) = found {
                self.rid = Rid::new(page_no, slot_no as u32);
                return Ok(());
            }
            page_no += 1;
            from = 0;
        }

        self.rid = Rid::new(NO_PAGE, 0);
        Ok(())
    }
}

impl Iterator for RecordScan<'_> {
    type Item = Result<Rid, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_end() {
            return None;
        }
        let rid = self.rid;
        if let Err(e) = self.advance() {
            self.rid = Rid::new(NO_PAGE, 0);
            return Some(Err(e));
        }
        Some(Ok(rid))
    }
}

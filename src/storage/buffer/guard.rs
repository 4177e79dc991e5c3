//! RAII guard for pinned pages.
//!
//! A guard is the only way to reach a frame's bytes. Dropping it unpins the
//! page, so every exit path of the caller releases its pin.

use log::warn;
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::types::{FrameId, Page, PageId};
use crate::storage::buffer::manager::BufferPoolManager;

pub struct PageGuard<'a> {
    bpm: &'a BufferPoolManager,
    page_id: PageId,
    frame_id: FrameId,
    is_dirty: bool,
}

impl<'a> PageGuard<'a> {
    pub(crate) fn new(bpm: &'a BufferPoolManager, page_id: PageId, frame_id: FrameId) -> Self {
        Self {
            bpm,
            page_id,
            frame_id,
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Shared access to the page bytes
    pub fn read(&self) -> RwLockReadGuard<'_, Page> {
        self.bpm.page_latch(self.frame_id).read()
    }

    /// Exclusive access to the page bytes. The page is unpinned dirty.
    pub fn write(&mut self) -> RwLockWriteGuard<'_, Page> {
        self.is_dirty = true;
        self.bpm.page_latch(self.frame_id).write()
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        if !self.bpm.unpin_page(self.page_id, self.is_dirty) {
            warn!("page {} was already unpinned when its guard dropped", self.page_id);
        }
    }
}

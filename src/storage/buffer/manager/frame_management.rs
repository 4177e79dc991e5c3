use log::debug;

use crate::common::types::{FrameId, PageId};
use crate::storage::buffer::error::BufferPoolError;
use super::{BufferPoolManager, FrameMeta, PoolState};

impl BufferPoolManager {
    /// Pick a frame for a new resident page: the free list first, then the replacer
    pub(super) fn find_victim_frame(&self, state: &mut PoolState) -> Option<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Some(frame_id);
        }
        state.replacer.victim()
    }

    /// Detach whatever page `frame_id` holds, writing it back first if dirty.
    ///
    /// On a failed write-back the frame stays resident and goes back to the
    /// replacer.
    pub(super) fn evict_frame(&self, state: &mut PoolState, frame_id: FrameId) -> Result<(), BufferPoolError> {
        let meta = &state.frames[frame_id as usize];
        let Some(old_page_id) = meta.page_id else {
            return Ok(());
        };

        if meta.is_dirty {
            if let Err(e) = self.write_back(old_page_id, frame_id) {
                state.replacer.unpin(frame_id);
                return Err(e);
            }
            debug!("wrote back dirty page {} from frame {}", old_page_id, frame_id);
        }

        state.page_table.remove(&old_page_id);
        state.frames[frame_id as usize] = FrameMeta::default();
        debug!("evicted page {} from frame {}", old_page_id, frame_id);
        Ok(())
    }

    /// Map `page_id` to `frame_id` with a single pin
    pub(super) fn install_page(&self, state: &mut PoolState, page_id: PageId, frame_id: FrameId) {
        state.frames[frame_id as usize] = FrameMeta {
            page_id: Some(page_id),
            pin_count: 1,
            is_dirty: false,
        };
        state.page_table.insert(page_id, frame_id);
        state.replacer.pin(frame_id);
    }

    /// Unmap a resident, unpinned page and put its zeroed frame on the free list
    pub(super) fn release_frame(&self, state: &mut PoolState, page_id: PageId, frame_id: FrameId) {
        state.page_table.remove(&page_id);
        state.replacer.pin(frame_id);
        state.frames[frame_id as usize] = FrameMeta::default();
        self.page_latch(frame_id).write().reset();
        state.free_list.push_back(frame_id);
    }

    pub(super) fn write_back(&self, page_id: PageId, frame_id: FrameId) -> Result<(), BufferPoolError> {
        let page = self.page_latch(frame_id).read();
        self.disk_manager
            .write_page(page_id.fd, page_id.page_no, &page.data[..])?;
        Ok(())
    }
}

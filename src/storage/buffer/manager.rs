use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};

use crate::common::types::{Fd, FrameId, Page, PageId};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::guard::PageGuard;
use crate::storage::buffer::replacer::{LruReplacer, Replacer};
use crate::storage::disk::DiskManager;

mod frame_management;

/// Bookkeeping for one frame. The bytes live separately in `BufferPoolManager::pages`.
#[derive(Debug, Default, Clone)]
pub(crate) struct FrameMeta {
    pub(crate) page_id: Option<PageId>,
    pub(crate) pin_count: u32,
    pub(crate) is_dirty: bool,
}

/// Everything guarded by the pool latch
pub(crate) struct PoolState {
    pub(crate) frames: Vec<FrameMeta>,
    pub(crate) page_table: HashMap<PageId, FrameId>,
    pub(crate) free_list: VecDeque<FrameId>,
    pub(crate) replacer: Box<dyn Replacer>,
}

/// Fixed-size page cache over the files of a `DiskManager`.
///
/// One mutex covers the page table, frame metadata, free list and replacer.
/// Page bytes sit behind a per-frame latch that is only reachable through a
/// pinned `PageGuard`. Lock order is pool latch, then frame latch: code holding
/// a frame latch must not call back into the pool.
pub struct BufferPoolManager {
    pool_size: usize,
    pages: Vec<RwLock<Page>>,
    state: Mutex<PoolState>,
    disk_manager: Arc<DiskManager>,
}

impl BufferPoolManager {
    /// Create a pool of `pool_size` frames using LRU replacement
    pub fn new(pool_size: usize, disk_manager: Arc<DiskManager>) -> Self {
        Self::with_replacer(pool_size, disk_manager, Box::new(LruReplacer::new(pool_size)))
    }

    pub fn with_replacer(
        pool_size: usize,
        disk_manager: Arc<DiskManager>,
        replacer: Box<dyn Replacer>,
    ) -> Self {
        let pages = (0..pool_size).map(|_| RwLock::new(Page::new())).collect();
        let free_list = (0..pool_size as FrameId).collect();

        Self {
            pool_size,
            pages,
            state: Mutex::new(PoolState {
                frames: vec![FrameMeta::default(); pool_size],
                page_table: HashMap::new(),
                free_list,
                replacer,
            }),
            disk_manager,
        }
    }

    /// Fetch a page, reading it from disk on a miss.
    ///
    /// Returns `Ok(None)` when every frame is pinned. The returned guard keeps
    /// the page pinned until it is dropped.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Option<PageGuard<'_>>, BufferPoolError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            state.frames[frame_id as usize].pin_count += 1;
            state.replacer.pin(frame_id);
            return Ok(Some(PageGuard::new(self, page_id, frame_id)));
        }

        let Some(frame_id) = self.find_victim_frame(state) else {
            warn!("buffer pool exhausted while fetching page {}", page_id);
            return Ok(None);
        };
        self.evict_frame(state, frame_id)?;

        {
            let mut page = self.pages[frame_id as usize].write();
            if let Err(e) = self
                .disk_manager
                .read_page(page_id.fd, page_id.page_no, &mut page.data[..])
            {
                state.free_list.push_back(frame_id);
                return Err(e.into());
            }
        }

        self.install_page(state, page_id, frame_id);
        Ok(Some(PageGuard::new(self, page_id, frame_id)))
    }

    /// Allocate a fresh page in file `fd` and pin it in a zeroed frame.
    ///
    /// Returns `Ok(None)` when every frame is pinned.
    pub fn new_page(&self, fd: Fd) -> Result<Option<PageGuard<'_>>, BufferPoolError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(frame_id) = self.find_victim_frame(state) else {
            warn!("buffer pool exhausted while creating a page in fd {}", fd);
            return Ok(None);
        };
        self.evict_frame(state, frame_id)?;

        let page_no = match self.disk_manager.allocate_page(fd) {
            Ok(page_no) => page_no,
            Err(e) => {
                state.free_list.push_back(frame_id);
                return Err(e.into());
            }
        };
        let page_id = PageId::new(fd, page_no);

        self.pages[frame_id as usize].write().reset();
        self.install_page(state, page_id, frame_id);
        Ok(Some(PageGuard::new(self, page_id, frame_id)))
    }

    /// Drop one pin on a page, OR-ing `is_dirty` into its dirty flag.
    ///
    /// Returns false if the page is not resident or not pinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        let meta = &mut state.frames[frame_id as usize];
        if meta.pin_count == 0 {
            return false;
        }

        meta.pin_count -= 1;
        meta.is_dirty |= is_dirty;
        if meta.pin_count == 0 {
            state.replacer.unpin(frame_id);
        }
        true
    }

    /// Write a resident page to disk whether or not it is pinned or dirty.
    ///
    /// Returns false if the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool, BufferPoolError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(false);
        };
        self.write_back(page_id, frame_id)?;
        state.frames[frame_id as usize].is_dirty = false;
        Ok(true)
    }

    /// Write back every resident page of `fd`. Nothing is evicted.
    pub fn flush_all_pages(&self, fd: Fd) -> Result<(), BufferPoolError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let resident: Vec<(PageId, FrameId)> = state
            .page_table
            .iter()
            .filter(|(page_id, _)| page_id.fd == fd)
            .map(|(&page_id, &frame_id)| (page_id, frame_id))
            .collect();

        for (page_id, frame_id) in resident {
            self.write_back(page_id, frame_id)?;
            state.frames[frame_id as usize].is_dirty = false;
        }
        Ok(())
    }

    /// Remove a page from the pool, returning its frame to the free list.
    ///
    /// A page that is not resident counts as deleted. A pinned page cannot be
    /// deleted and yields false.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool, BufferPoolError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(true);
        };
        if state.frames[frame_id as usize].pin_count > 0 {
            return Ok(false);
        }

        if state.frames[frame_id as usize].is_dirty {
            self.write_back(page_id, frame_id)?;
        }
        self.release_frame(state, page_id, frame_id);
        self.disk_manager.deallocate_page(page_id.fd, page_id.page_no);
        Ok(true)
    }

    /// Flush and drop every resident page of `fd`.
    ///
    /// Returns false, leaving pinned pages in place, if any page of the file is
    /// still pinned.
    pub fn delete_all_pages(&self, fd: Fd) -> Result<bool, BufferPoolError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let resident: Vec<(PageId, FrameId)> = state
            .page_table
            .iter()
            .filter(|(page_id, _)| page_id.fd == fd)
            .map(|(&page_id, &frame_id)| (page_id, frame_id))
            .collect();

        let mut all_removed = true;
        for (page_id, frame_id) in resident {
            let meta = &state.frames[frame_id as usize];
            if meta.pin_count > 0 {
                all_removed = false;
                continue;
            }
            if meta.is_dirty {
                self.write_back(page_id, frame_id)?;
            }
            self.release_frame(state, page_id, frame_id);
        }
        debug!("dropped resident pages of fd {} (complete: {})", fd, all_removed);
        Ok(all_removed)
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn disk_manager(&self) -> Arc<DiskManager> {
        Arc::clone(&self.disk_manager)
    }

    /// Pin count of a resident page
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| state.frames[frame_id as usize].pin_count)
    }

    /// Dirty flag of a resident page
    pub fn is_dirty(&self, page_id: PageId) -> Option<bool> {
        let state = self.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| state.frames[frame_id as usize].is_dirty)
    }

    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Number of frames the replacer may currently evict
    pub fn evictable_count(&self) -> usize {
        self.state.lock().replacer.size()
    }

    pub(crate) fn page_latch(&self, frame_id: FrameId) -> &RwLock<Page> {
        &self.pages[frame_id as usize]
    }
}

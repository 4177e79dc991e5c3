use linked_hash_map::LinkedHashMap;

use crate::common::types::FrameId;
use super::Replacer;

/// LRU (Least Recently Used) page replacement policy.
///
/// Frames are kept in unpin order: the front of the map is the frame that has
/// been evictable the longest. The map doubles as the membership index, so
/// `pin` removes in O(1).
pub struct LruReplacer {
    lru_list: LinkedHashMap<FrameId, ()>,
    capacity: usize,
}

impl LruReplacer {
    pub fn new(pool_size: usize) -> Self {
        Self {
            lru_list: LinkedHashMap::with_capacity(pool_size),
            capacity: pool_size,
        }
    }
}

impl Replacer for LruReplacer {
    fn victim(&mut self) -> Option<FrameId> {
        self.lru_list.pop_front().map(|(frame_id, _)| frame_id)
    }

    fn pin(&mut self, frame_id: FrameId) {
        self.lru_list.remove(&frame_id);
    }

    fn unpin(&mut self, frame_id: FrameId) {
        if self.lru_list.contains_key(&frame_id) || self.lru_list.len() >= self.capacity {
            return;
        }
        self.lru_list.insert(frame_id, ());
    }

    fn size(&self) -> usize {
        self.lru_list.len()
    }
}

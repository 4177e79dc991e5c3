mod lru;

pub use lru::LruReplacer;

use crate::common::types::FrameId;

/// Page replacement policy over the frames of a buffer pool.
///
/// A replacer only tracks frames that are currently evictable: resident
/// pages whose pin count dropped to zero.
pub trait Replacer: Send {
    /// Remove and return the frame that should be evicted next
    fn victim(&mut self) -> Option<FrameId>;

    /// The frame got pinned and must no longer be chosen as a victim
    fn pin(&mut self, frame_id: FrameId);

    /// The frame's pin count reached zero, making it evictable
    fn unpin(&mut self, frame_id: FrameId);

    /// Number of evictable frames
    fn size(&self) -> usize;
}

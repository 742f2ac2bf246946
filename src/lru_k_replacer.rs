use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

pub type FrameId = usize;
pub type Timestamp = u64;

/// A monotonic logical clock rather than wall-clock time: access order is
/// all LRU-K needs, and a logical counter can't collide the way
/// millisecond timestamps do under a tight test loop.
static CLOCK: AtomicU64 = AtomicU64::new(0);

fn tick() -> Timestamp {
    CLOCK.fetch_add(1, Ordering::Relaxed)
}

struct LruKNode {
    k: usize,
    is_evictable: bool,
    history: Vec<Timestamp>,
}

impl LruKNode {
    fn new(k: usize) -> Self {
        Self {
            k,
            history: vec![tick()],
            is_evictable: false,
        }
    }

    fn record_access(&mut self) {
        self.history.push(tick());
    }

    /// Backward k-distance: the gap between "now" and the k-th most recent
    /// access. `None` means fewer than `k` accesses have been recorded,
    /// which the replacer treats as an infinite distance.
    fn k_distance(&self, now: Timestamp) -> Option<Timestamp> {
        if self.history.len() < self.k {
            return None;
        }
        let kth_most_recent = self.history[self.history.len() - self.k];
        Some(now - kth_most_recent)
    }

    fn least_recent_access(&self) -> Timestamp {
        self.history[self.history.len() - 1]
    }
}

pub enum AccessType {
    Unknown,
    Lookup,
    Scan,
    Index,
}

/// Selects an eviction victim among evictable frames by classic LRU-K:
/// frames with fewer than `k` recorded accesses are preferred for eviction
/// (infinite k-distance), tie-broken by earliest overall access (true
/// LRU); among frames that do have a k-distance, the largest wins.
pub struct LruKReplacer {
    #[allow(dead_code)]
    num_of_frames: usize,
    k: usize,
    node_store: HashMap<FrameId, LruKNode>,
}

impl LruKReplacer {
    pub fn new(num_of_frames: usize, k: usize) -> Self {
        Self {
            num_of_frames,
            k,
            node_store: HashMap::default(),
        }
    }

    pub fn evict(&mut self) -> Option<FrameId> {
        let now = tick();
        let victim = self
            .node_store
            .iter()
            .filter(|(_, node)| node.is_evictable)
            .max_by_key(|(_, node)| match node.k_distance(now) {
                None => (1, Timestamp::MAX - node.least_recent_access()),
                Some(distance) => (0, distance),
            })
            .map(|(&frame_id, _)| frame_id);

        if let Some(frame_id) = victim {
            self.node_store.remove(&frame_id);
        }
        victim
    }

    pub fn record_access(&mut self, frame_id: FrameId, _access_type: AccessType) {
        match self.node_store.get_mut(&frame_id) {
            Some(node) => node.record_access(),
            None => {
                self.node_store.insert(frame_id, LruKNode::new(self.k));
            }
        };
    }

    pub fn remove(&mut self, frame_id: FrameId) {
        self.node_store.remove(&frame_id);
    }

    pub fn set_evictable(&mut self, frame_id: FrameId, is_evictable: bool) {
        if let Some(node) = self.node_store.get_mut(&frame_id) {
            node.is_evictable = is_evictable;
        }
    }

    pub fn size(&self) -> usize {
        self.node_store
            .values()
            .filter(|node| node.is_evictable)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_node() {
        let node = LruKNode::new(2);
        assert_eq!(node.k_distance(tick()), None);
    }

    #[test]
    fn test_history() {
        let mut node = LruKNode::new(3);
        node.record_access();
        node.record_access();

        assert!(node.k_distance(tick()).is_some());
    }

    #[test]
    fn test_init_replacer() {
        let replacer = LruKReplacer::new(10, 2);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_size_after_record_access() {
        let mut replacer = LruKReplacer::new(10, 2);

        replacer.record_access(12, AccessType::Unknown);
        replacer.record_access(13, AccessType::Unknown);

        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_size_after_set_evictable() {
        let frame_id = 12;
        let mut replacer = LruKReplacer::new(10, 2);

        replacer.record_access(frame_id, AccessType::Unknown);
        replacer.set_evictable(frame_id, true);
        assert_eq!(replacer.size(), 1);

        replacer.set_evictable(frame_id, false);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn evicts_frame_with_fewest_accesses_first() {
        let mut replacer = LruKReplacer::new(10, 2);

        // frame 1: two accesses (has a k-distance).
        replacer.record_access(1, AccessType::Unknown);
        replacer.record_access(1, AccessType::Unknown);
        replacer.set_evictable(1, true);

        // frame 2: a single access (no k-distance yet, evicted first).
        replacer.record_access(2, AccessType::Unknown);
        replacer.set_evictable(2, true);

        assert_eq!(replacer.evict(), Some(2));
        assert_eq!(replacer.evict(), Some(1));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn evict_ignores_non_evictable_frames() {
        let mut replacer = LruKReplacer::new(10, 1);
        replacer.record_access(1, AccessType::Unknown);
        replacer.set_evictable(1, false);

        assert_eq!(replacer.evict(), None);
    }
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::page::{PageId, INVALID_PAGE_ID};

use super::error::ExtendibleHashTableError;

type BucketIndex = usize;
/// A byte, not a `u32`: `local_depths` is one of two parallel arrays of
/// length `2^max_depth` that must fit on a single fixed-size page
/// alongside `bucket_page_ids` (spec.md §3 calls this out explicitly as
/// "byte each").
type BucketDepth = u8;

/// Maps hash prefixes (of length `global_depth`) to bucket page ids. Two
/// parallel arrays of length `2^max_depth`; only the first `2^global_depth`
/// entries are live (spec.md §3's directory page model).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ExtendibleHTableDirectoryPage {
    max_depth: u32,
    global_depth: u32,
    bucket_page_ids: Vec<PageId>,
    local_depths: Vec<BucketDepth>,
}

impl ExtendibleHTableDirectoryPage {
    /// A freshly allocated directory starts at global depth 0 with its
    /// single live slot pointing nowhere; the caller wires in the first
    /// bucket via `set_bucket_page_id(0, ...)`.
    pub fn new(max_depth: u32) -> Self {
        let capacity = 1 << max_depth;
        Self {
            max_depth,
            global_depth: 0,
            bucket_page_ids: vec![INVALID_PAGE_ID; capacity],
            local_depths: vec![0; capacity],
        }
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn get_global_depth(&self) -> u32 {
        self.global_depth
    }

    /// `HashToBucketIndex(hash) = hash & ((1 << global_depth) - 1)`, the
    /// low `global_depth` bits.
    pub fn hash_to_bucket_index(&self, hash: u64) -> BucketIndex {
        (hash & self.global_depth_mask()) as usize
    }

    fn global_depth_mask(&self) -> u64 {
        if self.global_depth == 0 {
            0
        } else {
            (1u64 << self.global_depth) - 1
        }
    }

    /// Number of live slots: `2^global_depth`.
    pub fn size(&self) -> usize {
        1 << self.global_depth
    }

    pub fn get_bucket_page_id(&self, bucket_index: BucketIndex) -> Option<PageId> {
        match self.bucket_page_ids.get(bucket_index) {
            Some(&id) if id != INVALID_PAGE_ID => Some(id),
            _ => None,
        }
    }

    pub fn set_bucket_page_id(&mut self, bucket_index: BucketIndex, bucket_page_id: PageId) {
        self.bucket_page_ids[bucket_index] = bucket_page_id;
    }

    pub fn get_local_depth(&self, bucket_index: BucketIndex) -> u32 {
        self.local_depths[bucket_index] as u32
    }

    pub fn set_local_depth(&mut self, bucket_index: BucketIndex, local_depth: u32) {
        self.local_depths[bucket_index] = local_depth as BucketDepth;
    }

    pub fn increment_local_depth(&mut self, bucket_index: BucketIndex) {
        self.local_depths[bucket_index] += 1;
    }

    pub fn decrement_local_depth(&mut self, bucket_index: BucketIndex) {
        if self.local_depths[bucket_index] > 0 {
            self.local_depths[bucket_index] -= 1;
        }
    }

    /// `GetSplitImageIndex(i) = i XOR (1 << (local_depth[i] - 1))`.
    /// Undefined (spec.md §4.1) when `local_depths[i] == 0`; callers only
    /// invoke this once a bucket has just been split and its local depth
    /// incremented past zero.
    pub fn get_split_image_index(&self, bucket_index: BucketIndex) -> BucketIndex {
        let local_depth = self.local_depths[bucket_index];
        assert!(
            local_depth > 0,
            "split image is undefined at local depth 0"
        );
        bucket_index ^ (1 << (local_depth - 1))
    }

    /// Doubles the directory: every live slot `i` in `0..2^old_global`
    /// copies into `i + 2^old_global` (spec.md §4.3 step 5a).
    pub fn incr_global_depth(&mut self) -> Result<(), ExtendibleHashTableError> {
        if self.global_depth == self.max_depth {
            return Err(ExtendibleHashTableError::DirectoryMaxDepthReached);
        }

        let old_size = self.size();
        for i in 0..old_size {
            self.bucket_page_ids[i + old_size] = self.bucket_page_ids[i];
            self.local_depths[i + old_size] = self.local_depths[i];
        }
        self.global_depth += 1;
        Ok(())
    }

    /// Halves the directory (spec.md §4.3 step 2d). Only ever called when
    /// no live slot still has `local_depth == global_depth`.
    pub fn decr_global_depth(&mut self) {
        debug_assert!(self.global_depth > 0);
        self.global_depth -= 1;
    }

    /// True once no live slot has `local_depth == global_depth`, meaning
    /// the directory can legally halve (spec.md §4.3 step 2d).
    pub fn can_shrink(&self) -> bool {
        (0..self.size()).all(|i| (self.local_depths[i] as u32) < self.global_depth)
    }

    pub fn is_saturated(&self) -> bool {
        self.global_depth == self.max_depth
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("directory page serialization is infallible")
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        bincode::deserialize(bytes).unwrap_or_else(|e| panic!("corrupt directory page: {e}"))
    }

    /// Exhaustively checks I1/I2 over the live prefix. Never mutates.
    pub fn verify_integrity(&self) {
        let mut page_id_to_count: HashMap<PageId, u32> = HashMap::new();
        let mut page_id_to_local_depth: HashMap<PageId, u32> = HashMap::new();

        for i in 0..self.size() {
            let page_id = self.bucket_page_ids[i];
            let local_depth = self.local_depths[i] as u32;

            assert!(
                local_depth <= self.global_depth,
                "I1 violated: local depth {local_depth} exceeds global depth {}",
                self.global_depth
            );

            *page_id_to_count.entry(page_id).or_insert(0) += 1;
            match page_id_to_local_depth.get(&page_id) {
                Some(&existing) => assert_eq!(
                    existing, local_depth,
                    "I2 violated: page {page_id} has inconsistent local depth"
                ),
                None => {
                    page_id_to_local_depth.insert(page_id, local_depth);
                }
            }
        }

        for (&page_id, &count) in &page_id_to_count {
            let local_depth = page_id_to_local_depth[&page_id];
            let expected = 1u32 << (self.global_depth - local_depth);
            assert_eq!(
                count, expected,
                "I2 violated: page {page_id} referenced by {count} slots, expected {expected}"
            );
        }
    }
}

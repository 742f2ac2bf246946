use serde::{Deserialize, Serialize};

use crate::page::{PageId, INVALID_PAGE_ID};

/// Root page: fans out by the top `max_depth` bits of a hash into
/// directory page ids. Immutable after construction (entries only ever
/// transition from `INVALID_PAGE_ID` to a real page id, never back).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ExtendibleHTableHeaderPage {
    max_depth: u32,
    directory_page_ids: Vec<PageId>,
}

impl ExtendibleHTableHeaderPage {
    pub fn new(max_depth: u32) -> Self {
        Self {
            max_depth,
            directory_page_ids: vec![INVALID_PAGE_ID; 1 << max_depth],
        }
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// `HashToDirectoryIndex(hash) = hash >> (64 - max_depth)`, the top
    /// `max_depth` bits. When `max_depth == 0` there is exactly one slot.
    pub fn hash_to_directory_index(&self, hash: u64) -> usize {
        if self.max_depth == 0 {
            0
        } else {
            (hash >> (64 - self.max_depth)) as usize
        }
    }

    pub fn get_directory_page_id(&self, directory_index: usize) -> Option<PageId> {
        match self.directory_page_ids.get(directory_index) {
            Some(&id) if id != INVALID_PAGE_ID => Some(id),
            _ => None,
        }
    }

    pub fn set_directory_page_id(&mut self, directory_index: usize, directory_page_id: PageId) {
        self.directory_page_ids[directory_index] = directory_page_id;
    }

    pub fn max_size(&self) -> usize {
        self.directory_page_ids.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("header page serialization is infallible")
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        bincode::deserialize(bytes)
            .unwrap_or_else(|e| panic!("corrupt header page: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_bits_select_directory_slot() {
        let header = ExtendibleHTableHeaderPage::new(2);
        // top 2 bits of an all-ones u64 are 0b11 == 3.
        assert_eq!(header.hash_to_directory_index(u64::MAX), 3);
        assert_eq!(header.hash_to_directory_index(0), 0);
    }

    #[test]
    fn depth_zero_always_selects_slot_zero() {
        let header = ExtendibleHTableHeaderPage::new(0);
        assert_eq!(header.hash_to_directory_index(u64::MAX), 0);
        assert_eq!(header.max_size(), 1);
    }

    #[test]
    fn round_trips_through_bytes() {
        let mut header = ExtendibleHTableHeaderPage::new(3);
        header.set_directory_page_id(5, 42);
        let decoded = ExtendibleHTableHeaderPage::from_bytes(&header.to_bytes());
        assert_eq!(decoded.get_directory_page_id(5), Some(42));
        assert_eq!(decoded.get_directory_page_id(0), None);
    }
}

use std::fmt::Debug;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::hash::KeyComparator;

/// Outcome of a bucket-level insert attempt: the bucket page itself never
/// decides whether to split, it just reports why an insert didn't happen
/// and leaves that decision to the index engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketInsertOutcome {
    Inserted,
    DuplicateKey,
    Full,
}

/// A fixed-capacity slot array of `(key, value)` pairs: a leaf node of the
/// extendible hash table. Capacity is set once at construction time and
/// never exceeded; the engine splits the bucket (spec.md §4.3) rather than
/// letting it grow past `max_size`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ExtendibleHTableBucketPage<K, V> {
    max_size: usize,
    entries: Vec<(K, V)>,
}

impl<K, V> ExtendibleHTableBucketPage<K, V>
where
    K: Clone + Debug + Serialize + DeserializeOwned,
    V: Clone + Debug + Serialize + DeserializeOwned,
{
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            entries: Vec::with_capacity(max_size),
        }
    }

    pub fn lookup<C: KeyComparator<K>>(&self, key: &K, cmp: &C) -> Option<&V> {
        self.entries
            .iter()
            .find(|(k, _)| cmp.equal(k, key))
            .map(|(_, v)| v)
    }

    /// Rejects a duplicate key (I5) before ever checking capacity, so a
    /// full bucket that already holds `key` reports `DuplicateKey`, not
    /// `Full`.
    pub fn insert<C: KeyComparator<K>>(
        &mut self,
        key: K,
        value: V,
        cmp: &C,
    ) -> BucketInsertOutcome {
        if self.entries.iter().any(|(k, _)| cmp.equal(k, &key)) {
            return BucketInsertOutcome::DuplicateKey;
        }
        if self.entries.len() >= self.max_size {
            return BucketInsertOutcome::Full;
        }
        self.entries.push((key, value));
        BucketInsertOutcome::Inserted
    }

    pub fn remove<C: KeyComparator<K>>(&mut self, key: &K, cmp: &C) -> Option<V> {
        let index = self.entries.iter().position(|(k, _)| cmp.equal(k, key))?;
        Some(self.entries.remove(index).1)
    }

    pub fn entries(&self) -> impl Iterator<Item = &(K, V)> {
        self.entries.iter()
    }

    /// Drains every entry out of the bucket; used by split and merge, both
    /// of which redistribute or relocate the full contents of a bucket.
    pub fn take_entries(&mut self) -> Vec<(K, V)> {
        std::mem::take(&mut self.entries)
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.max_size
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("bucket page serialization is infallible")
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        bincode::deserialize(bytes).unwrap_or_else(|e| panic!("corrupt bucket page: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::extendible_hash_table::hash::DefaultKeyComparator;

    #[test]
    fn rejects_duplicate_keys_even_when_full() {
        let mut bucket: ExtendibleHTableBucketPage<i32, i32> = ExtendibleHTableBucketPage::new(1);
        let cmp = DefaultKeyComparator;
        assert_eq!(bucket.insert(1, 10, &cmp), BucketInsertOutcome::Inserted);
        assert_eq!(
            bucket.insert(1, 99, &cmp),
            BucketInsertOutcome::DuplicateKey
        );
    }

    #[test]
    fn reports_full_once_capacity_is_reached() {
        let mut bucket: ExtendibleHTableBucketPage<i32, i32> = ExtendibleHTableBucketPage::new(1);
        let cmp = DefaultKeyComparator;
        bucket.insert(1, 10, &cmp);
        assert_eq!(bucket.insert(2, 20, &cmp), BucketInsertOutcome::Full);
    }

    #[test]
    fn remove_compacts_the_slot_array() {
        let mut bucket: ExtendibleHTableBucketPage<i32, i32> = ExtendibleHTableBucketPage::new(4);
        let cmp = DefaultKeyComparator;
        bucket.insert(1, 10, &cmp);
        bucket.insert(2, 20, &cmp);
        assert_eq!(bucket.remove(&1, &cmp), Some(10));
        assert_eq!(bucket.size(), 1);
        assert_eq!(bucket.lookup(&2, &cmp), Some(&20));
    }
}

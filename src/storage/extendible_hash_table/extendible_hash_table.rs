use std::collections::HashSet;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use crate::buffer_pool_manager::BufferPoolManager;
use crate::config::HashTableConfig;
use crate::page::PageId;

use super::error::ExtendibleHashTableError;
use super::extendible_hash_table_bucket_page::{BucketInsertOutcome, ExtendibleHTableBucketPage};
use super::extendible_hash_table_directory_page::ExtendibleHTableDirectoryPage;
use super::extendible_hash_table_header_page::ExtendibleHTableHeaderPage;
use super::hash::{HashFunction, KeyComparator};

/// On-disk extendible hash index: `Insert`/`GetValue`/`Remove` over
/// fixed-size keys and values, backed by a three-tier header/directory/
/// bucket page structure mediated by the buffer pool.
///
/// `H` and `C` are the pluggable hash function and key comparator
/// (spec.md §9's "capability set passed at construction"); `K`/`V` need
/// only be cloneable and (de)serializable, since equality is decided by
/// `C`, never by a derived `Eq` on `K`.
pub struct ExtendibleHashTable<K, V, H, C> {
    name: String,
    directory_max_depth: u32,
    bucket_max_size: usize,
    header_page_id: PageId,
    buffer_pool_manager: Arc<BufferPoolManager>,
    hash_fn: H,
    comparator: C,
    _marker: PhantomData<(K, V)>,
}

impl<K, V, H, C> ExtendibleHashTable<K, V, H, C>
where
    K: Clone + Debug + Serialize + DeserializeOwned,
    V: Clone + Debug + Serialize + DeserializeOwned,
    H: HashFunction<K>,
    C: KeyComparator<K>,
{
    pub fn new(
        name: String,
        buffer_pool_manager: Arc<BufferPoolManager>,
        header_max_depth: u32,
        directory_max_depth: u32,
        bucket_max_size: usize,
        hash_fn: H,
        comparator: C,
    ) -> Result<Self, ExtendibleHashTableError> {
        let config = HashTableConfig::new(header_max_depth, directory_max_depth, bucket_max_size)?;

        let mut header_guard = buffer_pool_manager.new_page()?;
        let header = ExtendibleHTableHeaderPage::new(config.header_max_depth);
        header_guard[..].copy_from_slice(&pad_to_page(header.to_bytes()));
        header_guard.mark_dirty();
        let header_page_id = header_guard.page_id();
        drop(header_guard);

        log::debug!(
            "hash table '{name}': initialized header page {header_page_id} (header_max_depth={}, directory_max_depth={}, bucket_max_size={})",
            config.header_max_depth, config.directory_max_depth, config.bucket_max_size,
        );

        Ok(Self {
            name,
            directory_max_depth: config.directory_max_depth,
            bucket_max_size: config.bucket_max_size,
            header_page_id,
            buffer_pool_manager,
            hash_fn,
            comparator,
            _marker: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads the header and returns the directory page id for `hash`'s
    /// slot, if one has been allocated yet.
    fn find_directory_page_id(&self, hash: u64) -> Result<Option<PageId>, ExtendibleHashTableError> {
        let header_guard = self.buffer_pool_manager.fetch_page_read(self.header_page_id)?;
        let header = ExtendibleHTableHeaderPage::from_bytes(&header_guard);
        let directory_index = header.hash_to_directory_index(hash);
        Ok(header.get_directory_page_id(directory_index))
    }

    /// Returns the directory page id for `hash`'s header slot, allocating
    /// and wiring in a fresh (empty, `global_depth == 0`) directory if the
    /// slot was unoccupied. Double-checks under the header's write latch
    /// so two concurrent inserts into the same empty slot never both
    /// allocate a directory.
    fn find_or_create_directory_page_id(
        &self,
        hash: u64,
    ) -> Result<PageId, ExtendibleHashTableError> {
        if let Some(id) = self.find_directory_page_id(hash)? {
            return Ok(id);
        }

        let mut header_guard = self.buffer_pool_manager.fetch_page_write(self.header_page_id)?;
        let mut header = ExtendibleHTableHeaderPage::from_bytes(&header_guard);
        let directory_index = header.hash_to_directory_index(hash);

        if let Some(id) = header.get_directory_page_id(directory_index) {
            return Ok(id);
        }

        let directory = ExtendibleHTableDirectoryPage::new(self.directory_max_depth);
        let mut directory_guard = self.buffer_pool_manager.new_page()?;
        directory_guard[..].copy_from_slice(&pad_to_page(directory.to_bytes()));
        directory_guard.mark_dirty();
        let directory_page_id = directory_guard.page_id();
        drop(directory_guard);

        header.set_directory_page_id(directory_index, directory_page_id);
        header_guard[..].copy_from_slice(&pad_to_page(header.to_bytes()));
        header_guard.mark_dirty();

        log::debug!(
            "hash table '{}': allocated directory page {directory_page_id} at header slot {directory_index}",
            self.name
        );

        Ok(directory_page_id)
    }

    /// Allocates a fresh, empty bucket page and returns its id. Does not
    /// wire it into any directory slot — the caller does that.
    fn allocate_bucket(&self) -> Result<PageId, ExtendibleHashTableError> {
        let bucket = ExtendibleHTableBucketPage::<K, V>::new(self.bucket_max_size);
        let mut guard = self.buffer_pool_manager.new_page()?;
        guard[..].copy_from_slice(&pad_to_page(bucket.to_bytes()));
        guard.mark_dirty();
        Ok(guard.page_id())
    }

    fn read_bucket(&self, page_id: PageId) -> Result<ExtendibleHTableBucketPage<K, V>, ExtendibleHashTableError> {
        let guard = self.buffer_pool_manager.fetch_page_read(page_id)?;
        Ok(ExtendibleHTableBucketPage::from_bytes(&guard))
    }

    fn write_bucket(
        &self,
        page_id: PageId,
        bucket: &ExtendibleHTableBucketPage<K, V>,
    ) -> Result<(), ExtendibleHashTableError> {
        let mut guard = self.buffer_pool_manager.fetch_page_write(page_id)?;
        guard[..].copy_from_slice(&pad_to_page(bucket.to_bytes()));
        guard.mark_dirty();
        Ok(())
    }

    /// Every value paired with an equal key: length 0 or 1, since I5
    /// forbids duplicate keys. Acquires read guards only.
    pub fn get_value(&self, key: &K) -> Result<Option<V>, ExtendibleHashTableError> {
        let hash = self.hash_fn.hash(key);
        let directory_page_id = match self.find_directory_page_id(hash)? {
            Some(id) => id,
            None => return Ok(None),
        };

        let directory_guard = self.buffer_pool_manager.fetch_page_read(directory_page_id)?;
        let directory = ExtendibleHTableDirectoryPage::from_bytes(&directory_guard);
        let bucket_index = directory.hash_to_bucket_index(hash);
        let bucket_page_id = match directory.get_bucket_page_id(bucket_index) {
            Some(id) => id,
            None => return Ok(None),
        };

        let bucket_guard = self.buffer_pool_manager.fetch_page_read(bucket_page_id)?;
        drop(directory_guard);
        let bucket = ExtendibleHTableBucketPage::<K, V>::from_bytes(&bucket_guard);
        Ok(bucket.lookup(key, &self.comparator).cloned())
    }

    /// `true` if inserted; `false` if the key already existed or the
    /// directory at this hash prefix is saturated (spec.md §4.3).
    pub fn insert(&self, key: K, value: V) -> Result<bool, ExtendibleHashTableError> {
        let hash = self.hash_fn.hash(&key);
        let directory_page_id = self.find_or_create_directory_page_id(hash)?;

        // Coarse latch: one write guard on the directory page held for the
        // whole operation, including every split retry (spec.md §5's
        // permitted simplification).
        let mut directory_guard = self.buffer_pool_manager.fetch_page_write(directory_page_id)?;
        let mut directory = ExtendibleHTableDirectoryPage::from_bytes(&directory_guard);

        loop {
            let bucket_index = directory.hash_to_bucket_index(hash);

            let bucket_page_id = match directory.get_bucket_page_id(bucket_index) {
                Some(id) => id,
                None => {
                    let id = self.allocate_bucket()?;
                    directory.set_bucket_page_id(bucket_index, id);
                    id
                }
            };

            let mut bucket = self.read_bucket(bucket_page_id)?;

            match bucket.insert(key.clone(), value.clone(), &self.comparator) {
                BucketInsertOutcome::DuplicateKey => {
                    directory_guard[..].copy_from_slice(&pad_to_page(directory.to_bytes()));
                    directory_guard.mark_dirty();
                    return Ok(false);
                }
                BucketInsertOutcome::Inserted => {
                    self.write_bucket(bucket_page_id, &bucket)?;
                    directory_guard[..].copy_from_slice(&pad_to_page(directory.to_bytes()));
                    directory_guard.mark_dirty();
                    return Ok(true);
                }
                BucketInsertOutcome::Full => {
                    let local_depth = directory.get_local_depth(bucket_index);
                    let global_depth = directory.get_global_depth();

                    if local_depth == global_depth {
                        if global_depth == directory.max_depth() {
                            log::warn!(
                                "hash table '{}': directory {directory_page_id} saturated at global_depth={global_depth}, insert rejected",
                                self.name
                            );
                            directory_guard[..].copy_from_slice(&pad_to_page(directory.to_bytes()));
                            directory_guard.mark_dirty();
                            return Ok(false);
                        }
                        directory.incr_global_depth()?;
                    }

                    let image_page_id = self.allocate_bucket()?;
                    directory.increment_local_depth(bucket_index);
                    let new_local_depth = directory.get_local_depth(bucket_index);
                    // Every slot previously aliased to the splitting bucket shares its
                    // *old* local-depth bits; `high_bit` is the newly-significant bit
                    // that discriminates which of those slots now owns the image.
                    let old_local_depth_mask = (1u64 << (new_local_depth - 1)) - 1;
                    let high_bit = 1u64 << (new_local_depth - 1);
                    let aligned = bucket_index as u64 & old_local_depth_mask;

                    for i in 0..directory.size() {
                        if (i as u64) & old_local_depth_mask != aligned {
                            continue;
                        }
                        directory.set_local_depth(i, new_local_depth);
                        if (i as u64) & high_bit != 0 {
                            directory.set_bucket_page_id(i, image_page_id);
                        }
                    }

                    log::debug!(
                        "hash table '{}': split bucket {bucket_page_id} (new local_depth={new_local_depth}) into image {image_page_id}",
                        self.name
                    );

                    let entries = bucket.take_entries();
                    let mut old_bucket = ExtendibleHTableBucketPage::<K, V>::new(self.bucket_max_size);
                    let mut image_bucket = ExtendibleHTableBucketPage::<K, V>::new(self.bucket_max_size);

                    for (k, v) in entries {
                        let k_hash = self.hash_fn.hash(&k);
                        let target_index = directory.hash_to_bucket_index(k_hash);
                        if directory.get_bucket_page_id(target_index) == Some(image_page_id) {
                            image_bucket.insert(k, v, &self.comparator);
                        } else {
                            old_bucket.insert(k, v, &self.comparator);
                        }
                    }

                    self.write_bucket(bucket_page_id, &old_bucket)?;
                    self.write_bucket(image_page_id, &image_bucket)?;

                    // Retry the insert against the now-split buckets.
                }
            }
        }
    }

    /// `true` if an entry was removed; `false` if the key was absent.
    /// Cascades empty-bucket merges and directory halving per spec.md
    /// §4.3 step 2.
    pub fn remove(&self, key: &K) -> Result<bool, ExtendibleHashTableError> {
        let hash = self.hash_fn.hash(key);
        let directory_page_id = match self.find_directory_page_id(hash)? {
            Some(id) => id,
            None => return Ok(false),
        };

        let mut directory_guard = self.buffer_pool_manager.fetch_page_write(directory_page_id)?;
        let mut directory = ExtendibleHTableDirectoryPage::from_bytes(&directory_guard);

        let bucket_index = directory.hash_to_bucket_index(hash);
        let bucket_page_id = match directory.get_bucket_page_id(bucket_index) {
            Some(id) => id,
            None => return Ok(false),
        };

        let mut bucket = self.read_bucket(bucket_page_id)?;
        let removed = bucket.remove(key, &self.comparator);
        self.write_bucket(bucket_page_id, &bucket)?;

        if removed.is_none() {
            return Ok(false);
        }

        let mut current_index = bucket_index;
        loop {
            let current_page_id = directory
                .get_bucket_page_id(current_index)
                .ok_or(ExtendibleHashTableError::NoBucketForPageId(current_index))?;
            let current_bucket = self.read_bucket(current_page_id)?;
            if !current_bucket.is_empty() {
                break;
            }

            let local_depth = directory.get_local_depth(current_index);
            if local_depth == 0 {
                break;
            }

            let split_image_index = directory.get_split_image_index(current_index);
            let image_local_depth = directory.get_local_depth(split_image_index);
            if image_local_depth != local_depth {
                break;
            }

            let image_page_id = directory
                .get_bucket_page_id(split_image_index)
                .ok_or(ExtendibleHashTableError::NoBucketForPageId(split_image_index))?;

            for i in 0..directory.size() {
                let pointee = directory.get_bucket_page_id(i);
                if pointee == Some(current_page_id) || pointee == Some(image_page_id) {
                    directory.set_bucket_page_id(i, image_page_id);
                    directory.decrement_local_depth(i);
                }
            }

            log::debug!(
                "hash table '{}': merged empty bucket {current_page_id} into {image_page_id}",
                self.name
            );

            while directory.can_shrink() {
                directory.decr_global_depth();
                log::debug!(
                    "hash table '{}': directory {directory_page_id} shrank to global_depth={}",
                    self.name,
                    directory.get_global_depth()
                );
            }

            current_index = directory.hash_to_bucket_index(hash);
        }

        directory_guard[..].copy_from_slice(&pad_to_page(directory.to_bytes()));
        directory_guard.mark_dirty();
        Ok(true)
    }

    /// Walks the header and every reachable directory and bucket, asserting
    /// `I1`–`I5` exhaustively. Never mutates; panics on violation (spec.md
    /// §7 — an invariant violation has no valid continuation).
    pub fn verify_integrity(&self) -> Result<(), ExtendibleHashTableError> {
        let header_guard = self.buffer_pool_manager.fetch_page_read(self.header_page_id)?;
        let header = ExtendibleHTableHeaderPage::from_bytes(&header_guard);
        drop(header_guard);

        // Dedupe by bucket page id: a bucket shared by several directory
        // slots (I2) must only contribute its entries to the I5 check once.
        let mut visited_buckets: HashSet<PageId> = HashSet::new();
        let mut all_keys: Vec<K> = Vec::new();

        for index in 0..header.max_size() {
            if let Some(directory_page_id) = header.get_directory_page_id(index) {
                let directory_guard = self.buffer_pool_manager.fetch_page_read(directory_page_id)?;
                let directory = ExtendibleHTableDirectoryPage::from_bytes(&directory_guard);
                drop(directory_guard);
                directory.verify_integrity();

                for bucket_index in 0..directory.size() {
                    let Some(bucket_page_id) = directory.get_bucket_page_id(bucket_index) else {
                        continue;
                    };
                    let local_depth = directory.get_local_depth(bucket_index);
                    let bucket = self.read_bucket(bucket_page_id)?;
                    let expected = low_bits(bucket_index as u64, local_depth);

                    for (key, _) in bucket.entries() {
                        let hash = self.hash_fn.hash(key);
                        assert_eq!(
                            low_bits(hash, local_depth),
                            expected,
                            "I3 violated: key {key:?} is placed in directory slot {bucket_index} \
                             (local_depth={local_depth}) but its hash's low bits don't match"
                        );
                    }

                    if visited_buckets.insert(bucket_page_id) {
                        all_keys.extend(bucket.entries().map(|(k, _)| k.clone()));
                    }
                }
            }
        }

        for i in 0..all_keys.len() {
            for j in (i + 1)..all_keys.len() {
                assert!(
                    !self.comparator.equal(&all_keys[i], &all_keys[j]),
                    "I5 violated: key {:?} appears in more than one live bucket entry",
                    all_keys[i]
                );
            }
        }

        Ok(())
    }

    /// Diagnostic, side-effect-free-on-index-state dump of header,
    /// directory, and bucket occupancy. Written to the `log` facade's
    /// `debug!`/`trace!` sink, not stdout.
    pub fn print_ht(&self) -> Result<(), ExtendibleHashTableError> {
        let header_guard = self.buffer_pool_manager.fetch_page_read(self.header_page_id)?;
        let header = ExtendibleHTableHeaderPage::from_bytes(&header_guard);
        drop(header_guard);

        log::debug!(
            "hash table '{}': header page {} (max_depth={})",
            self.name,
            self.header_page_id,
            header.max_depth()
        );

        for index in 0..header.max_size() {
            let Some(directory_page_id) = header.get_directory_page_id(index) else {
                continue;
            };
            let directory_guard = self.buffer_pool_manager.fetch_page_read(directory_page_id)?;
            let directory = ExtendibleHTableDirectoryPage::from_bytes(&directory_guard);
            drop(directory_guard);

            log::debug!(
                "  directory[{index}] = page {directory_page_id} (global_depth={})",
                directory.get_global_depth()
            );

            for bucket_index in 0..directory.size() {
                if let Some(bucket_page_id) = directory.get_bucket_page_id(bucket_index) {
                    let bucket = self.read_bucket(bucket_page_id)?;
                    log::trace!(
                        "    bucket[{bucket_index}] = page {bucket_page_id} (local_depth={}, size={}/{})",
                        directory.get_local_depth(bucket_index),
                        bucket.size(),
                        bucket.max_size()
                    );
                }
            }
        }

        Ok(())
    }
}

/// `bincode`'s non-length-prefixed encoding of these page structs is
/// always `<= PAGE_SIZE`; the remainder of the page's fixed buffer is
/// left zeroed, matching the teacher's own page-write convention.
fn pad_to_page(mut bytes: Vec<u8>) -> Vec<u8> {
    bytes.resize(crate::page::PAGE_SIZE, 0);
    bytes
}

/// The low `depth` bits of `value` (spec.md §8's `low_bits` placement check).
fn low_bits(value: u64, depth: u32) -> u64 {
    if depth == 0 {
        0
    } else {
        value & ((1u64 << depth) - 1)
    }
}

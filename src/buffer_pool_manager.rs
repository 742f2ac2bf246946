use dashmap::DashMap;
use parking_lot::{Mutex, RwLockReadGuard, RwLockWriteGuard};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::{
    disk_manager::DiskManager,
    disk_scheduler::DiskScheduler,
    lru_k_replacer::{AccessType, FrameId, LruKReplacer},
    page::{Page, PageId, PAGE_SIZE},
};

#[derive(Error, Debug)]
pub enum BufferPoolError {
    #[error("buffer pool exhausted: no frame available to pin page {0}")]
    PoolExhausted(PageId),
    #[error("page {0} is not resident in the buffer pool")]
    PageNotResident(PageId),
    #[error("page {0} is pinned and cannot be deleted")]
    PagePinned(PageId),
}

/// Scoped, read-latched, pinned view of a page's bytes. Releases the pin
/// (and the latch, via `Drop` on the inner `parking_lot` guard) when it
/// goes out of scope — the index never holds one across a return to its
/// caller.
pub struct PageReadGuard<'a> {
    page_id: PageId,
    page: &'a Page,
    bpm: &'a BufferPoolManager,
    inner: RwLockReadGuard<'a, Vec<u8>>,
}

impl<'a> PageReadGuard<'a> {
    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.inner
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.bpm.unpin(self.page_id, self.page, false);
    }
}

/// Scoped, write-latched, pinned view of a page's bytes. A write guard
/// tracks a dirty flag (set via `mark_dirty`) that is written through to
/// the page on release, per the buffer pool guard contract.
pub struct PageWriteGuard<'a> {
    page_id: PageId,
    page: &'a Page,
    bpm: &'a BufferPoolManager,
    inner: RwLockWriteGuard<'a, Vec<u8>>,
}

impl<'a> PageWriteGuard<'a> {
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn mark_dirty(&mut self) {
        self.page.set_dirty(true);
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.inner
    }
}

impl DerefMut for PageWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.inner
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        let dirty = self.page.is_dirty();
        self.bpm.unpin(self.page_id, self.page, dirty);
    }
}

enum Init {
    /// A brand-new page: zero-fill and mark dirty, no disk read.
    Fresh,
    /// An existing page: load its bytes from disk.
    FromDisk,
}

#[derive(Debug)]
pub struct BufferPoolManager {
    free_list: Mutex<Vec<FrameId>>,
    pages: Vec<Page>,
    replacer: Mutex<LruKReplacer>,
    disk_scheduler: DiskScheduler,
    pages_map: DashMap<PageId, FrameId>,
    next_page_id: AtomicI32,
}

impl BufferPoolManager {
    pub fn new(disk_manager: DiskManager, pool_size: usize, replacer_k: usize) -> Self {
        let pages = (0..pool_size).map(|_| Page::new()).collect();
        let free_list = (0..pool_size).collect();

        Self {
            pages,
            free_list: Mutex::new(free_list),
            replacer: Mutex::new(LruKReplacer::new(pool_size, replacer_k)),
            disk_scheduler: DiskScheduler::new(Arc::new(disk_manager)),
            pages_map: DashMap::default(),
            next_page_id: AtomicI32::new(0),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pages.len()
    }

    pub fn new_page(&self) -> Result<PageWriteGuard<'_>, BufferPoolError> {
        let page_id = self.next_page_id.fetch_add(1, Ordering::Relaxed);
        let frame_id = self.acquire_frame(page_id, Init::Fresh)?;
        let page = &self.pages[frame_id];
        page.set_dirty(true);
        log::debug!("buffer pool: allocated new page {page_id} in frame {frame_id}");
        Ok(PageWriteGuard {
            page_id,
            page,
            bpm: self,
            inner: page.get_data_write(),
        })
    }

    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>, BufferPoolError> {
        let frame_id = self.acquire_frame(page_id, Init::FromDisk)?;
        let page = &self.pages[frame_id];
        Ok(PageReadGuard {
            page_id,
            page,
            bpm: self,
            inner: page.get_data_read(),
        })
    }

    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>, BufferPoolError> {
        let frame_id = self.acquire_frame(page_id, Init::FromDisk)?;
        let page = &self.pages[frame_id];
        Ok(PageWriteGuard {
            page_id,
            page,
            bpm: self,
            inner: page.get_data_write(),
        })
    }

    pub fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let frame_id = *self
            .pages_map
            .get(&page_id)
            .ok_or(BufferPoolError::PageNotResident(page_id))?;
        self.flush_frame(page_id, frame_id);
        Ok(())
    }

    pub fn flush_all_pages(&self) {
        let page_ids: Vec<PageId> = self.pages_map.iter().map(|e| *e.key()).collect();
        for page_id in page_ids {
            let _ = self.flush_page(page_id);
        }
    }

    pub fn delete_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let frame_id = *self
            .pages_map
            .get(&page_id)
            .ok_or(BufferPoolError::PageNotResident(page_id))?;
        let page = &self.pages[frame_id];

        if page.is_pinned() {
            return Err(BufferPoolError::PagePinned(page_id));
        }

        self.pages_map.remove(&page_id);
        self.replacer.lock().remove(frame_id);
        page.reset();
        self.free_list.lock().push(frame_id);
        Ok(())
    }

    /// Pins and returns the frame id holding `page_id`, fetching a frame
    /// from the free list or evicting a victim and loading/initializing
    /// the page's bytes if it was not already resident.
    fn acquire_frame(&self, page_id: PageId, init: Init) -> Result<FrameId, BufferPoolError> {
        if let Some(frame_id) = self.pages_map.get(&page_id).map(|e| *e) {
            self.pages[frame_id].pin();
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id, AccessType::Unknown);
            replacer.set_evictable(frame_id, false);
            return Ok(frame_id);
        }

        let frame_id = match self.free_list.lock().pop() {
            Some(frame_id) => frame_id,
            None => self
                .replacer
                .lock()
                .evict()
                .ok_or(BufferPoolError::PoolExhausted(page_id))?,
        };

        if let Some(old_page_id) = self.pages[frame_id].get_id() {
            if self.pages[frame_id].is_dirty() {
                self.flush_frame(old_page_id, frame_id);
            }
            self.pages_map.remove(&old_page_id);
        }

        let page = &self.pages[frame_id];
        page.reset();
        page.set_id(page_id);
        match init {
            Init::Fresh => {}
            Init::FromDisk => {
                let bytes = self.disk_scheduler.schedule_read(page_id);
                *page.get_data_write() = bytes.to_vec();
            }
        }
        page.pin();

        self.pages_map.insert(page_id, frame_id);
        let mut replacer = self.replacer.lock();
        replacer.record_access(frame_id, AccessType::Unknown);
        replacer.set_evictable(frame_id, false);

        Ok(frame_id)
    }

    fn flush_frame(&self, page_id: PageId, frame_id: FrameId) {
        let page = &self.pages[frame_id];
        let bytes: Box<[u8; PAGE_SIZE]> = Box::new(
            page.get_data_read()
                .as_slice()
                .try_into()
                .expect("page buffer is always PAGE_SIZE bytes"),
        );
        self.disk_scheduler.schedule_write(page_id, bytes);
        page.set_dirty(false);
    }

    fn unpin(&self, page_id: PageId, page: &Page, is_dirty: bool) {
        page.set_dirty(is_dirty);
        page.unpin();
        if !page.is_pinned() {
            if let Some(frame_id) = self.pages_map.get(&page_id).map(|e| *e) {
                self.replacer.lock().set_evictable(frame_id, true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn bpm(pool_size: usize) -> (BufferPoolManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let dm = DiskManager::new(dir.path().join("test.db")).unwrap();
        (BufferPoolManager::new(dm, pool_size, 2), dir)
    }

    #[test]
    fn new_page_is_dirty_and_zeroed() {
        let (bpm, _dir) = bpm(4);
        let guard = bpm.new_page().unwrap();
        assert_eq!(&guard[..8], &[0u8; 8]);
    }

    #[test]
    fn writes_survive_eviction_and_refetch() {
        let (bpm, _dir) = bpm(1);
        let page_id = {
            let mut guard = bpm.new_page().unwrap();
            guard[0] = 42;
            guard.mark_dirty();
            guard.page_id()
        };

        // Only one frame: fetching another page evicts the first.
        let other = bpm.new_page().unwrap();
        let other_id = other.page_id();
        drop(other);

        let refetched = bpm.fetch_page_read(page_id).unwrap();
        assert_eq!(refetched[0], 42);
        drop(refetched);
        assert_ne!(other_id, page_id);
    }

    #[test]
    fn pinned_page_cannot_be_evicted() {
        let (bpm, _dir) = bpm(1);
        let held = bpm.new_page().unwrap();
        let err = bpm.new_page().unwrap_err();
        assert!(matches!(err, BufferPoolError::PoolExhausted(_)));
        drop(held);
    }

    #[test]
    fn delete_requires_unpinned_page() {
        let (bpm, _dir) = bpm(2);
        let guard = bpm.new_page().unwrap();
        let page_id = guard.page_id();
        assert!(matches!(
            bpm.delete_page(page_id),
            Err(BufferPoolError::PagePinned(_))
        ));
        drop(guard);
        bpm.delete_page(page_id).unwrap();
    }
}

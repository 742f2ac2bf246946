use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::page::{PageId, PAGE_SIZE};

/// Owns the single heap file backing an index and performs positioned,
/// page-granular reads and writes against it. Two processes pointed at the
/// same path and the same structural parameters read the same index.
#[derive(Debug)]
pub struct DiskManager {
    file: File,
    path: PathBuf,
    num_writes: AtomicU64,
    num_reads: AtomicU64,
}

impl DiskManager {
    pub fn new<P: AsRef<Path>>(db_path: P) -> io::Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        Ok(Self {
            file,
            path,
            num_writes: AtomicU64::new(0),
            num_reads: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads a page at `page_id`'s byte offset into `page_content`. A page
    /// beyond the current end of the file (never written) reads as zeros.
    pub fn read_page(&self, page_id: PageId, page_content: &mut [u8; PAGE_SIZE]) {
        self.num_reads.fetch_add(1, Ordering::Relaxed);
        let offset = page_id as u64 * PAGE_SIZE as u64;
        match self.file.read_at(page_content, offset) {
            Ok(n) if n == PAGE_SIZE => {}
            Ok(n) => {
                // short read past EOF: zero-fill the remainder.
                page_content[n..].fill(0);
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                page_content.fill(0);
            }
            Err(e) => panic!("disk manager: read_page({page_id}) failed: {e}"),
        }
    }

    pub fn write_page(&self, page_id: PageId, page_content: &[u8; PAGE_SIZE]) {
        self.num_writes.fetch_add(1, Ordering::Relaxed);
        let offset = page_id as u64 * PAGE_SIZE as u64;
        self.file
            .write_at(page_content, offset)
            .unwrap_or_else(|e| panic!("disk manager: write_page({page_id}) failed: {e}"));
    }

    pub fn num_reads(&self) -> u64 {
        self.num_reads.load(Ordering::Relaxed)
    }

    pub fn num_writes(&self) -> u64 {
        self.num_writes.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_a_written_page() {
        let dir = tempdir().unwrap();
        let dm = DiskManager::new(dir.path().join("test.db")).unwrap();

        let page7 = [7u8; PAGE_SIZE];
        let page3 = [3u8; PAGE_SIZE];
        dm.write_page(7, &page7);
        dm.write_page(3, &page3);

        let mut buf = [0u8; PAGE_SIZE];
        dm.read_page(7, &mut buf);
        assert_eq!(buf, page7);
        dm.read_page(3, &mut buf);
        assert_eq!(buf, page3);
    }

    #[test]
    fn unwritten_page_reads_as_zero() {
        let dir = tempdir().unwrap();
        let dm = DiskManager::new(dir.path().join("test.db")).unwrap();

        let mut buf = [0xffu8; PAGE_SIZE];
        dm.read_page(42, &mut buf);
        assert_eq!(buf, [0u8; PAGE_SIZE]);
    }
}

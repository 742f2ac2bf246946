use parking_lot::{Condvar, Mutex};
use std::{
    collections::{HashMap, HashSet, VecDeque},
    mem,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Sender},
        Arc,
    },
    thread,
};

use crate::{
    disk_manager::DiskManager,
    page::{PageId, PAGE_SIZE},
};

#[derive(Debug)]
enum DiskRequestKind {
    Read,
    Write(Box<[u8; PAGE_SIZE]>),
}

#[derive(Debug)]
pub enum DiskResponse {
    Read(Box<[u8; PAGE_SIZE]>),
    Write,
}

#[derive(Debug)]
struct DiskRequest {
    page_id: PageId,
    kind: DiskRequestKind,
    callback_sender: Sender<DiskResponse>,
}

/// One queue per page id so reads/writes of the *same* page are never
/// processed concurrently; different pages proceed in parallel across
/// workers.
#[derive(Debug, Default)]
struct DiskRequestQueue {
    queues: HashMap<PageId, VecDeque<DiskRequest>>,
    in_processing_ids: HashSet<PageId>,
}

impl DiskRequestQueue {
    fn push(&mut self, disk_request: DiskRequest) {
        self.queues
            .entry(disk_request.page_id)
            .or_default()
            .push_back(disk_request);
    }

    fn start_processing(&mut self) -> Option<DiskRequest> {
        let ready_page_id = self
            .queues
            .keys()
            .find(|page_id| !self.in_processing_ids.contains(*page_id))
            .copied()?;
        self.in_processing_ids.insert(ready_page_id);
        self.queues.get_mut(&ready_page_id).and_then(VecDeque::pop_front)
    }

    fn end_processing(&mut self, page_id: &PageId) {
        self.in_processing_ids.remove(page_id);
        if let Some(queue) = self.queues.get_mut(page_id) {
            if queue.is_empty() {
                self.queues.remove(page_id);
            }
        }
    }

}

#[derive(Debug)]
struct Worker {
    thread: thread::JoinHandle<()>,
}

impl Worker {
    fn new(
        queue: Arc<(Mutex<DiskRequestQueue>, Condvar)>,
        disk_manager: Arc<DiskManager>,
        stop_flag: Arc<AtomicBool>,
    ) -> Self {
        let thread = thread::spawn(move || {
            let (lock, cvar) = &*queue;
            loop {
                let mut guard = lock.lock();
                let request = loop {
                    if let Some(request) = guard.start_processing() {
                        break Some(request);
                    }
                    if stop_flag.load(Ordering::Relaxed) {
                        break None;
                    }
                    cvar.wait(&mut guard);
                };
                drop(guard);

                let Some(request) = request else {
                    return;
                };

                let page_id = request.page_id;
                log::trace!("disk scheduler: processing page {page_id}");
                let response = match request.kind {
                    DiskRequestKind::Read => {
                        let mut buf = Box::new([0u8; PAGE_SIZE]);
                        disk_manager.read_page(page_id, &mut buf);
                        DiskResponse::Read(buf)
                    }
                    DiskRequestKind::Write(data) => {
                        disk_manager.write_page(page_id, &data);
                        DiskResponse::Write
                    }
                };
                let _ = request.callback_sender.send(response);

                let mut guard = lock.lock();
                guard.end_processing(&page_id);
                cvar.notify_all();
            }
        });
        Self { thread }
    }
}

#[derive(Debug)]
struct WorkerPool {
    workers: Vec<Worker>,
    shared: Arc<(Mutex<DiskRequestQueue>, Condvar)>,
    stop_flag: Arc<AtomicBool>,
}

impl WorkerPool {
    fn new(size: usize, disk_manager: Arc<DiskManager>) -> Self {
        let shared = Arc::new((Mutex::new(DiskRequestQueue::default()), Condvar::new()));
        let stop_flag = Arc::new(AtomicBool::new(false));

        let workers = (0..size)
            .map(|_| {
                Worker::new(
                    Arc::clone(&shared),
                    Arc::clone(&disk_manager),
                    Arc::clone(&stop_flag),
                )
            })
            .collect();

        Self {
            workers,
            shared,
            stop_flag,
        }
    }

    fn execute(&self, disk_request: DiskRequest) {
        let (lock, cvar) = &*self.shared;
        lock.lock().push(disk_request);
        cvar.notify_all();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        self.shared.1.notify_all();
        for worker in mem::take(&mut self.workers) {
            let _ = worker.thread.join();
        }
    }
}

/// Dispatches page reads/writes to background workers, serialized per page
/// id. Callers block on the returned channel, which is the sole suspension
/// point spec.md §5 allows ("any page fetch through the buffer pool may
/// block while... the disk manager performs I/O").
#[derive(Debug)]
pub struct DiskScheduler {
    pool: WorkerPool,
}

impl DiskScheduler {
    pub fn new(disk_manager: Arc<DiskManager>) -> Self {
        Self {
            pool: WorkerPool::new(4, disk_manager),
        }
    }

    pub fn schedule_read(&self, page_id: PageId) -> Box<[u8; PAGE_SIZE]> {
        let (sender, receiver) = mpsc::channel();
        self.pool.execute(DiskRequest {
            page_id,
            kind: DiskRequestKind::Read,
            callback_sender: sender,
        });
        match receiver.recv().expect("disk scheduler worker died") {
            DiskResponse::Read(buf) => buf,
            DiskResponse::Write => unreachable!("read request got a write response"),
        }
    }

    pub fn schedule_write(&self, page_id: PageId, data: Box<[u8; PAGE_SIZE]>) {
        let (sender, receiver) = mpsc::channel();
        self.pool.execute(DiskRequest {
            page_id,
            kind: DiskRequestKind::Write(data),
            callback_sender: sender,
        });
        receiver.recv().expect("disk scheduler worker died");
    }
}

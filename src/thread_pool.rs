use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Shutdown,
}

/// A fixed-size pool of worker threads dispatched over a shared channel.
/// Used by the benchmark harness to drive concurrent client load against
/// the hash table without spawning a thread per request.
pub struct ThreadPool {
    workers: Vec<Worker>,
    sender: Option<Sender<Message>>,
}

impl ThreadPool {
    pub fn new(size: u32) -> Self {
        assert!(size > 0, "thread pool size must be positive");

        let (sender, receiver) = mpsc::channel();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size)
            .map(|id| Worker::new(id, Arc::clone(&receiver)))
            .collect();

        Self {
            workers,
            sender: Some(sender),
        }
    }

    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let job = Box::new(job);
        self.sender
            .as_ref()
            .expect("sender is only taken on drop")
            .send(Message::Run(job))
            .expect("worker threads outlive the pool");
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        let sender = self.sender.take().expect("sender is only taken once");
        for _ in &self.workers {
            let _ = sender.send(Message::Shutdown);
        }
        drop(sender);

        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

struct Worker {
    #[allow(dead_code)]
    id: u32,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn new(id: u32, receiver: Arc<Mutex<mpsc::Receiver<Message>>>) -> Self {
        let handle = thread::spawn(move || loop {
            let message = receiver.lock().expect("thread pool mutex poisoned").recv();
            match message {
                Ok(Message::Run(job)) => job(),
                Ok(Message::Shutdown) | Err(_) => break,
            }
        });

        Self {
            id,
            handle: Some(handle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn runs_every_spawned_job() {
        let pool = ThreadPool::new(4);
        let counter = Arc::new(AtomicU32::new(0));
        let (done_tx, done_rx) = mpsc::channel();

        for _ in 0..20 {
            let counter = Arc::clone(&counter);
            let done_tx = done_tx.clone();
            pool.spawn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = done_tx.send(());
            });
        }

        for _ in 0..20 {
            done_rx.recv().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }
}

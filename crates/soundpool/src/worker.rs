// Bounded worker pool running playback loops

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct WorkerShared {
    name: String,
    receiver: Receiver<Job>,
    min_threads: usize,
    max_threads: usize,
    idle_timeout: Duration,
    live: AtomicUsize,
    idle: AtomicUsize,
    spawned: AtomicUsize,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

/// Thread pool with `min_threads` resident workers and up to `max_threads`
/// in total. Workers above the minimum exit after `idle_timeout` without work.
/// The job queue is unbounded.
pub struct WorkerPool {
    sender: Mutex<Option<Sender<Job>>>,
    shared: Arc<WorkerShared>,
}

impl WorkerPool {
    pub fn new(name: &str, min_threads: usize, max_threads: usize, idle_timeout: Duration) -> Self {
        let (sender, receiver) = unbounded();
        let max_threads = max_threads.max(1);
        Self {
            sender: Mutex::new(Some(sender)),
            shared: Arc::new(WorkerShared {
                name: name.to_string(),
                receiver,
                min_threads: min_threads.min(max_threads),
                max_threads,
                idle_timeout,
                live: AtomicUsize::new(0),
                idle: AtomicUsize::new(0),
                spawned: AtomicUsize::new(0),
                handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Queue a job; returns false once the pool has been shut down
    pub fn execute<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return false;
        };
        if sender.send(Box::new(job)).is_err() {
            return false;
        }

        let queued = self.shared.receiver.len();
        if queued > self.shared.idle.load(Ordering::SeqCst) {
            self.spawn_worker();
        }
        true
    }

    fn spawn_worker(&self) {
        let shared = &self.shared;
        let mut live = shared.live.load(Ordering::SeqCst);
        loop {
            if live >= shared.max_threads {
                return;
            }
            match shared
                .live
                .compare_exchange(live, live + 1, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => break,
                Err(current) => live = current,
            }
        }

        let index = shared.spawned.fetch_add(1, Ordering::SeqCst) + 1;
        let worker_shared = shared.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-{}", shared.name, index))
            .spawn(move || worker_loop(worker_shared));

        match spawned {
            Ok(handle) => {
                let mut handles = shared.handles.lock();
                handles.retain(|h| !h.is_finished());
                handles.push(handle);
            }
            Err(e) => {
                shared.live.fetch_sub(1, Ordering::SeqCst);
                log::error!("[worker] failed to spawn worker thread: {}", e);
            }
        }
    }

    pub fn live_threads(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    pub fn queued_jobs(&self) -> usize {
        self.shared.receiver.len()
    }

    /// Stop accepting work and join every worker once the queue drains.
    /// Safe to call from a worker thread, which is then left to finish on its own.
    pub fn shutdown(&self) {
        let Some(sender) = self.sender.lock().take() else {
            return;
        };
        drop(sender);

        let handles: Vec<JoinHandle<()>> = self.shared.handles.lock().drain(..).collect();
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                log::warn!("[worker] worker thread panicked");
            }
        }
        log::debug!("[worker] {} shut down", self.shared.name);
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Decrements the live count however the worker exits
struct LiveGuard<'a>(&'a AtomicUsize);

impl Drop for LiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn worker_loop(shared: Arc<WorkerShared>) {
    let live_guard = LiveGuard(&shared.live);
    loop {
        shared.idle.fetch_add(1, Ordering::SeqCst);
        let received = shared.receiver.recv_timeout(shared.idle_timeout);
        shared.idle.fetch_sub(1, Ordering::SeqCst);

        match received {
            Ok(job) => job(),
            Err(RecvTimeoutError::Timeout) => {
                if retire_if_surplus(&shared) {
                    log::debug!("[worker] idle worker retired");
                    // Already decremented by the retirement claim
                    std::mem::forget(live_guard);
                    return;
                }
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

/// Claim a retirement slot while more than `min_threads` workers are alive
/// and no job is waiting
fn retire_if_surplus(shared: &WorkerShared) -> bool {
    let mut live = shared.live.load(Ordering::SeqCst);
    while live > shared.min_threads {
        if !shared.receiver.is_empty() {
            return false;
        }
        match shared
            .live
            .compare_exchange(live, live - 1, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => return true,
            Err(current) => live = current,
        }
    }
    false
}

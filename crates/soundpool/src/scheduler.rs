// Load/unload queues drained by a single loader thread

use crate::sample::PlaybackSample;
use parking_lot::{Condvar, Mutex};
use soundpool_core::{AudioError, Result};
use soundpool_source::SampleSource;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Work item for the loader thread
pub(crate) enum LoadTask {
    Load {
        sample: Arc<PlaybackSample>,
        source: SampleSource,
    },
    Unload(Arc<PlaybackSample>),
}

impl LoadTask {
    pub(crate) fn sample(&self) -> &Arc<PlaybackSample> {
        match self {
            LoadTask::Load { sample, .. } | LoadTask::Unload(sample) => sample,
        }
    }
}

#[derive(Default)]
struct QueueState {
    loads: VecDeque<LoadTask>,
    unloads: VecDeque<LoadTask>,
    shutdown: bool,
}

/// Two FIFO queues; unloads are always served before loads
pub(crate) struct LoadQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl LoadQueue {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
        }
    }

    /// Enqueue a task; hands it back once the queue has been shut down
    pub(crate) fn push(&self, task: LoadTask) -> std::result::Result<(), LoadTask> {
        let mut state = self.state.lock();
        if state.shutdown {
            return Err(task);
        }
        match task {
            LoadTask::Load { .. } => state.loads.push_back(task),
            LoadTask::Unload(_) => state.unloads.push_back(task),
        }
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Block until a task is available; `None` after shutdown
    pub(crate) fn next(&self) -> Option<LoadTask> {
        let mut state = self.state.lock();
        let mut idle = false;
        loop {
            if state.shutdown {
                return None;
            }
            if let Some(task) = state.unloads.pop_front() {
                return Some(task);
            }
            if let Some(task) = state.loads.pop_front() {
                return Some(task);
            }
            if !idle {
                log::debug!("[loader] idle");
                idle = true;
            }
            self.available.wait(&mut state);
        }
    }

    /// Stop the queue and hand back everything still pending, unloads first
    pub(crate) fn shutdown(&self) -> Vec<LoadTask> {
        let mut state = self.state.lock();
        state.shutdown = true;
        let mut drained: Vec<LoadTask> = state.unloads.drain(..).collect();
        drained.extend(state.loads.drain(..));
        drop(state);
        self.available.notify_all();
        drained
    }

    pub(crate) fn pending(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.loads.len(), state.unloads.len())
    }
}

/// Start the loader thread; it runs `handler` for each task until the queue shuts down
pub(crate) fn spawn_loader<F>(queue: Arc<LoadQueue>, mut handler: F) -> Result<JoinHandle<()>>
where
    F: FnMut(LoadTask) + Send + 'static,
{
    thread::Builder::new()
        .name("soundpool-loader".to_string())
        .spawn(move || {
            log::debug!("[loader] started");
            while let Some(task) = queue.next() {
                handler(task);
            }
            log::debug!("[loader] finished");
        })
        .map_err(|e| AudioError::InitializationError(format!("spawn loader thread: {}", e)))
}

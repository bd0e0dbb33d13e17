// Load-complete notification
// Listener calls are posted to a dedicated thread so the loader never blocks on user code

use crate::state::SampleId;
use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

/// Emitted once per load attempt, including failures
#[derive(Debug, Clone, PartialEq)]
pub struct LoadEvent {
    pub sample_id: SampleId,
    pub success: bool,
    pub error: Option<String>,
}

/// Load-complete listener
/// Implementations should be lightweight and non-blocking
pub trait LoadCompleteListener: Send + Sync {
    fn on_load_complete(&self, event: LoadEvent);
}

impl<F> LoadCompleteListener for F
where
    F: Fn(LoadEvent) + Send + Sync,
{
    fn on_load_complete(&self, event: LoadEvent) {
        self(event)
    }
}

enum DispatchMessage {
    Event(LoadEvent),
    Shutdown,
}

/// Asynchronous event dispatcher with a single registrable listener
pub struct EventDispatcher {
    listener: Arc<Mutex<Option<Arc<dyn LoadCompleteListener>>>>,
    sender: Sender<DispatchMessage>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded::<DispatchMessage>();
        let listener: Arc<Mutex<Option<Arc<dyn LoadCompleteListener>>>> = Arc::new(Mutex::new(None));
        let listener_clone = listener.clone();

        let handle = thread::Builder::new()
            .name("soundpool-events".to_string())
            .spawn(move || {
                while let Ok(message) = receiver.recv() {
                    match message {
                        DispatchMessage::Event(event) => {
                            // Clone out so the listener runs without the registration lock held
                            let current = listener_clone.lock().clone();
                            if let Some(listener) = current {
                                listener.on_load_complete(event);
                            }
                        }
                        DispatchMessage::Shutdown => break,
                    }
                }
                log::debug!("[events] dispatcher finished");
            })
            .map_err(|e| log::error!("[events] failed to spawn dispatcher: {}", e))
            .ok();

        Self {
            listener,
            sender,
            thread: Mutex::new(handle),
        }
    }

    pub fn set_listener(&self, listener: Option<Arc<dyn LoadCompleteListener>>) {
        *self.listener.lock() = listener;
    }

    pub fn has_listener(&self) -> bool {
        self.listener.lock().is_some()
    }

    /// Post an event; dropped silently when no listener is registered
    pub fn post(&self, event: LoadEvent) {
        if !self.has_listener() {
            return;
        }
        if self.sender.send(DispatchMessage::Event(event)).is_err() {
            log::warn!("[events] dispatcher already shut down");
        }
    }

    /// Deliver queued events, then stop the dispatcher thread
    pub fn shutdown(&self) {
        let _ = self.sender.send(DispatchMessage::Shutdown);
        if let Some(handle) = self.thread.lock().take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

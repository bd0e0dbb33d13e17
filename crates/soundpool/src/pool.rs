// Sample pool: capacity-bounded registry, load scheduler and playback workers

use crate::sample::{PlaybackSample, SampleConfig};
use crate::scheduler::{spawn_loader, LoadQueue, LoadTask};
use crate::worker::WorkerPool;
use parking_lot::{Mutex, RwLock};
use soundpool_core::{
    AudioError, DecoderFactory, EventDispatcher, LoadCompleteListener, LoadEvent, PoolConfig,
    Result, SampleId, SetResult, SinkFactory,
};
use soundpool_decode_symphonia::SymphoniaDecoderFactory;
use soundpool_renderer_cpal::CpalSinkFactory;
use soundpool_source::{DefaultResolver, SampleSource, SourceResolver};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

struct Registry {
    samples: HashMap<SampleId, Arc<PlaybackSample>>,
    next_id: SampleId,
}

struct PoolShared {
    config: PoolConfig,
    registry: RwLock<Registry>,
    queue: Arc<LoadQueue>,
    loader: Mutex<Option<JoinHandle<()>>>,
    workers: WorkerPool,
    events: EventDispatcher,
    resolver: Arc<dyn SourceResolver>,
    decoders: Arc<dyn DecoderFactory>,
    sinks: Arc<dyn SinkFactory>,
    released: AtomicBool,
}

impl PoolShared {
    /// Allocate an id and register a sample, or `None` when full or released
    fn reserve(&self, make: impl FnOnce(SampleId) -> PlaybackSample) -> Option<Arc<PlaybackSample>> {
        let mut registry = self.registry.write();
        if self.released.load(Ordering::SeqCst) {
            return None;
        }
        if registry.samples.len() >= self.config.max_samples {
            log::warn!(
                "[pool] capacity reached ({} samples), rejecting load",
                self.config.max_samples
            );
            return None;
        }
        let id = registry.next_id;
        registry.next_id += 1;
        let sample = Arc::new(make(id));
        registry.samples.insert(id, sample.clone());
        Some(sample)
    }

    fn get(&self, id: SampleId) -> Option<Arc<PlaybackSample>> {
        self.registry.read().samples.get(&id).cloned()
    }

    fn snapshot(&self) -> Vec<Arc<PlaybackSample>> {
        self.registry.read().samples.values().cloned().collect()
    }

    fn remove(&self, id: SampleId) -> Option<Arc<PlaybackSample>> {
        self.registry.write().samples.remove(&id)
    }

    fn sample_config(&self, buffer_size: Option<usize>, is_static: bool) -> SampleConfig {
        let buffer_size = buffer_size
            .filter(|size| *size > 0)
            .unwrap_or(self.config.default_buffer_size);
        SampleConfig::derive(&self.config, buffer_size, is_static)
    }

    fn enqueue_load(&self, sample: Arc<PlaybackSample>, source: SampleSource) -> Option<SampleId> {
        let id = sample.id();
        if let Err(rejected) = self.queue.push(LoadTask::Load { sample, source }) {
            self.remove(id);
            rejected.sample().close();
            return None;
        }
        log::debug!("[pool] sample {} queued for load", id);
        Some(id)
    }

    fn unload(&self, id: SampleId) -> bool {
        let Some(sample) = self.remove(id) else {
            return false;
        };
        sample.stop();
        if let Err(rejected) = self.queue.push(LoadTask::Unload(sample)) {
            rejected.sample().close();
        }
        log::debug!("[pool] sample {} unloaded", id);
        true
    }

    fn handle_task(&self, task: LoadTask) {
        match task {
            LoadTask::Unload(sample) => sample.close(),
            LoadTask::Load { sample, source } => {
                let id = sample.id();
                let outcome = self.load_sample(&sample, source);
                let error = match outcome {
                    Ok(()) => None,
                    Err(e) => {
                        log::warn!("[loader] sample {} failed to load: {}", id, e);
                        self.remove(id);
                        sample.close();
                        Some(e.to_string())
                    }
                };
                self.events.post(LoadEvent {
                    sample_id: id,
                    success: error.is_none(),
                    error,
                });
            }
        }
    }

    fn load_sample(&self, sample: &PlaybackSample, source: SampleSource) -> Result<()> {
        if sample.is_closed() {
            return Err(AudioError::LoadError("sample unloaded before load".to_string()));
        }
        let resolved = self.resolver.resolve(source)?;
        sample.load(resolved, self.decoders.as_ref(), self.sinks.as_ref())
    }

    /// Body of a `play_once` worker job
    fn run_one_shot(&self, sample: Arc<PlaybackSample>, source: SampleSource, left: f32, right: f32, rate: f32) {
        let id = sample.id();
        let played = self
            .load_sample(&sample, source)
            .map(|()| sample.play_one_shot(left, right, rate));
        match played {
            Ok(true) => log::debug!("[pool] one-shot {} finished", id),
            Ok(false) => log::debug!("[pool] one-shot {} cancelled", id),
            Err(e) => log::warn!("[pool] one-shot {} failed: {}", id, e),
        }
        self.unload(id);
        sample.close();
    }

    fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("[pool] releasing");

        for task in self.queue.shutdown() {
            task.sample().close();
        }

        // Closing first also aborts a load in progress on the loader thread
        let samples: Vec<Arc<PlaybackSample>> = {
            let mut registry = self.registry.write();
            registry.next_id = 0;
            registry.samples.drain().map(|(_, sample)| sample).collect()
        };
        for sample in &samples {
            sample.stop();
            sample.close();
        }

        if let Some(handle) = self.loader.lock().take() {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                log::warn!("[loader] loader thread panicked");
            }
        }
        self.workers.shutdown();
        self.events.shutdown();
        log::info!("[pool] released {} samples", samples.len());
    }
}

/// Pool of independently controllable samples.
///
/// Loads are resolved and decoded on one background loader thread, in
/// request order. Each playing sample runs its playback loop on a worker.
/// Control calls never block on decoding or I/O.
pub struct SoundPool {
    shared: Arc<PoolShared>,
}

impl SoundPool {
    /// Pool using the filesystem/HTTP resolver, symphonia and the default output device
    pub fn new(config: PoolConfig) -> Result<Self> {
        Self::with_resolver(config, Arc::new(DefaultResolver::new()))
    }

    pub fn with_resolver(config: PoolConfig, resolver: Arc<dyn SourceResolver>) -> Result<Self> {
        Self::with_collaborators(
            config,
            resolver,
            Arc::new(SymphoniaDecoderFactory::new()),
            Arc::new(CpalSinkFactory::new()),
        )
    }

    pub fn with_collaborators(
        config: PoolConfig,
        resolver: Arc<dyn SourceResolver>,
        decoders: Arc<dyn DecoderFactory>,
        sinks: Arc<dyn SinkFactory>,
    ) -> Result<Self> {
        config.validate()?;

        let workers = WorkerPool::new(
            "soundpool-play",
            config.min_play_threads,
            config.max_play_threads,
            config.worker_idle_timeout,
        );
        let shared = Arc::new(PoolShared {
            registry: RwLock::new(Registry {
                samples: HashMap::new(),
                next_id: 0,
            }),
            queue: Arc::new(LoadQueue::new()),
            loader: Mutex::new(None),
            workers,
            events: EventDispatcher::new(),
            resolver,
            decoders,
            sinks,
            released: AtomicBool::new(false),
            config,
        });

        let weak: Weak<PoolShared> = Arc::downgrade(&shared);
        let handle = spawn_loader(shared.queue.clone(), move |task| match weak.upgrade() {
            Some(shared) => shared.handle_task(task),
            None => task.sample().close(),
        })?;
        *shared.loader.lock() = Some(handle);

        log::info!(
            "[pool] created: max_samples={} buffer={} threads={}..{}",
            shared.config.max_samples,
            shared.config.default_buffer_size,
            shared.config.min_play_threads,
            shared.config.max_play_threads
        );
        Ok(Self { shared })
    }

    /// Queue a sample for loading.
    ///
    /// Returns `None` without consuming an id when the source is empty, the
    /// pool is full or released. The outcome is reported to the load-complete
    /// listener. `buffer_size` defaults to the pool's default buffer size.
    pub fn load(
        &self,
        source: impl Into<SampleSource>,
        buffer_size: Option<usize>,
        is_static: bool,
    ) -> Option<SampleId> {
        let source = source.into();
        if source.is_empty() {
            log::debug!("[pool] empty source rejected");
            return None;
        }
        let config = self.shared.sample_config(buffer_size, is_static);
        let sample = self
            .shared
            .reserve(|id| PlaybackSample::new(id, config))?;
        self.shared.enqueue_load(sample, source)
    }

    /// Open a path synchronously and queue the opened source for decoding.
    ///
    /// Unlike [`SoundPool::load`], an empty or unopenable path is an error.
    /// `Ok(None)` means the pool is full or released.
    pub fn load_file(&self, path: &str, buffer_size: Option<usize>, is_static: bool) -> Result<Option<SampleId>> {
        let source = SampleSource::from_path(path);
        if source.is_empty() {
            return Err(AudioError::IoError("empty sample path".to_string()));
        }
        let extension = source.extension();
        let resolved = self.shared.resolver.resolve(source)?;
        let resolved = match resolved.extension {
            Some(_) => resolved,
            None => resolved.with_extension(extension),
        };

        let config = self.shared.sample_config(buffer_size, is_static);
        let Some(sample) = self.shared.reserve(|id| PlaybackSample::new(id, config)) else {
            return Ok(None);
        };
        Ok(self.shared.enqueue_load(sample, SampleSource::Opened(resolved)))
    }

    /// Remove a sample; `true` only the first time for a given id
    pub fn unload(&self, id: SampleId) -> bool {
        self.shared.unload(id)
    }

    /// Start a sample from its beginning.
    /// `repeat`: 0 plays once, N plays N+1 times, -1 loops forever.
    pub fn play(&self, id: SampleId, left: f32, right: f32, repeat: i32, rate: f32) -> Option<SampleId> {
        let sample = self.shared.get(id)?;
        sample
            .play(left, right, repeat, rate, &self.shared.workers)
            .then_some(id)
    }

    /// Load and play a source once, then unload it.
    ///
    /// The sample reports playing from the moment this returns. Pausing it
    /// ends it for good.
    pub fn play_once(&self, source: impl Into<SampleSource>, left: f32, right: f32, rate: f32) -> Option<SampleId> {
        let source = source.into();
        if source.is_empty() {
            return None;
        }
        let config = SampleConfig::derive(&self.shared.config, self.shared.config.play_once_buffer_size, false);
        let sample = self
            .shared
            .reserve(|id| PlaybackSample::new_one_shot(id, config))?;
        let id = sample.id();

        let weak = Arc::downgrade(&self.shared);
        let job_sample = sample.clone();
        let submitted = self.shared.workers.execute(move || match weak.upgrade() {
            Some(shared) => shared.run_one_shot(job_sample, source, left, right, rate),
            None => job_sample.close(),
        });
        if !submitted {
            self.shared.remove(id);
            sample.close();
            return None;
        }
        log::debug!("[pool] one-shot {} submitted", id);
        Some(id)
    }

    pub fn pause(&self, id: SampleId) -> bool {
        self.shared.get(id).is_some_and(|s| s.pause())
    }

    pub fn resume(&self, id: SampleId) -> bool {
        self.shared
            .get(id)
            .is_some_and(|s| s.resume(&self.shared.workers))
    }

    pub fn stop(&self, id: SampleId) -> bool {
        self.shared.get(id).is_some_and(|s| s.stop())
    }

    pub fn set_volume(&self, id: SampleId, left: f32, right: f32) -> SetResult {
        self.shared
            .get(id)
            .map_or(SetResult::InvalidOperation, |s| s.set_volume(left, right))
    }

    /// Same gain on both channels
    pub fn set_volume_mono(&self, id: SampleId, volume: f32) -> SetResult {
        self.set_volume(id, volume, volume)
    }

    pub fn set_rate(&self, id: SampleId, rate: f32) -> SetResult {
        self.shared
            .get(id)
            .map_or(SetResult::InvalidOperation, |s| s.set_rate(rate))
    }

    pub fn set_loop(&self, id: SampleId, repeat: i32) -> SetResult {
        self.shared
            .get(id)
            .map_or(SetResult::InvalidOperation, |s| s.set_loop(repeat))
    }

    /// Pause every playing sample
    pub fn auto_pause(&self) {
        let paused = self
            .shared
            .snapshot()
            .iter()
            .filter(|s| s.pause())
            .count();
        log::debug!("[pool] auto pause: {} samples", paused);
    }

    /// Resume every paused sample
    pub fn auto_resume(&self) {
        let workers = &self.shared.workers;
        let resumed = self
            .shared
            .snapshot()
            .iter()
            .filter(|s| s.resume(workers))
            .count();
        log::debug!("[pool] auto resume: {} samples", resumed);
    }

    pub fn is_loaded(&self, id: SampleId) -> bool {
        self.shared.get(id).is_some_and(|s| s.is_loaded())
    }

    pub fn is_playing(&self, id: SampleId) -> bool {
        self.shared.get(id).is_some_and(|s| s.is_playing())
    }

    pub fn is_paused(&self, id: SampleId) -> bool {
        self.shared.get(id).is_some_and(|s| s.is_paused())
    }

    pub fn is_stopped(&self, id: SampleId) -> bool {
        self.shared.get(id).is_some_and(|s| s.is_stopped())
    }

    /// True while any sample is playing
    pub fn is_any_playing(&self) -> bool {
        self.shared.snapshot().iter().any(|s| s.is_playing())
    }

    pub fn sample(&self, id: SampleId) -> Option<Arc<PlaybackSample>> {
        self.shared.get(id)
    }

    /// Samples currently holding a slot, including loading and one-shot samples
    pub fn loaded_count(&self) -> usize {
        self.shared.registry.read().samples.len()
    }

    pub fn capacity(&self) -> usize {
        self.shared.config.max_samples
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Loads and unloads waiting for the loader thread
    pub fn pending_tasks(&self) -> (usize, usize) {
        self.shared.queue.pending()
    }

    pub fn set_load_complete_listener(&self, listener: Option<Arc<dyn LoadCompleteListener>>) {
        self.shared.events.set_listener(listener);
    }

    /// Stop the loader, close every sample and shut down the workers.
    /// The pool rejects all further requests.
    pub fn release(&self) {
        self.shared.release();
    }

    pub fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::SeqCst)
    }
}

impl Drop for SoundPool {
    fn drop(&mut self) {
        self.shared.release();
    }
}

impl std::fmt::Debug for SoundPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundPool")
            .field("loaded", &self.loaded_count())
            .field("capacity", &self.capacity())
            .field("released", &self.is_released())
            .finish()
    }
}

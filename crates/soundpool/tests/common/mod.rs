// Shared fakes: scripted decoder, simulated sink with a playhead thread, recording listener
#![allow(dead_code)]

use parking_lot::{Condvar, Mutex};
use soundpool::{
    AudioError, AudioSink, CompressedChunk, DecodeEngine, DecodeOutput, DecoderFactory,
    LoadCompleteListener, LoadEvent, PoolConfig, ResolvedSource, Result, SampleId, SampleSource,
    SinkFactory, SinkSpec, SinkState, SoundPool, SourceResolver, StreamFormat,
};
use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// Clip description read back by [`ScriptedEngine`] from the source bytes
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub channels: u16,
    pub sample_rate: u32,
    pub frames: usize,
    pub chunk_frames: usize,
    /// Decoder stops producing output after this many chunks
    pub stall_after: Option<usize>,
    pub fail_negotiate: bool,
    /// Size reported by the resolver, defaults to the PCM size
    pub declared_size: Option<u64>,
}

impl Script {
    pub fn clip(frames: usize) -> Self {
        Self {
            channels: 1,
            sample_rate: 8_000,
            frames,
            chunk_frames: 256,
            stall_after: None,
            fail_negotiate: false,
            declared_size: None,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames as f64 / self.sample_rate as f64)
    }

    pub fn pcm_bytes(&self) -> usize {
        self.frames * self.channels as usize * 2
    }

    fn encode(&self) -> Vec<u8> {
        format!(
            "{} {} {} {} {} {}",
            self.channels,
            self.sample_rate,
            self.frames,
            self.chunk_frames,
            self.stall_after.map_or(-1, |n| n as i64),
            self.fail_negotiate as u8
        )
        .into_bytes()
    }

    fn decode(text: &str) -> Option<Self> {
        let fields: Vec<i64> = text
            .split_whitespace()
            .map(|f| f.parse().ok())
            .collect::<Option<_>>()?;
        if fields.len() != 6 {
            return None;
        }
        Some(Self {
            channels: fields[0] as u16,
            sample_rate: fields[1] as u32,
            frames: fields[2] as usize,
            chunk_frames: fields[3] as usize,
            stall_after: (fields[4] >= 0).then_some(fields[4] as usize),
            fail_negotiate: fields[5] != 0,
            declared_size: None,
        })
    }
}

/// Frame `index` carries the value `index` on every channel
pub fn frame_value(index: usize) -> i16 {
    (index % 32_768) as i16
}

pub fn expected_frames(range: std::ops::Range<usize>) -> Vec<i16> {
    range.map(frame_value).collect()
}

/// Resolves names to scripted clips
#[derive(Default)]
pub struct ScriptResolver {
    scripts: Mutex<HashMap<String, Script>>,
}

impl ScriptResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, name: &str, script: Script) {
        self.scripts.lock().insert(name.to_string(), script);
    }
}

impl SourceResolver for ScriptResolver {
    fn resolve(&self, source: SampleSource) -> Result<ResolvedSource> {
        let name = match source {
            SampleSource::Path(name) => name,
            SampleSource::Opened(resolved) => return Ok(resolved),
            other => return Err(AudioError::IoError(format!("unsupported source {:?}", other))),
        };
        let script = self
            .scripts
            .lock()
            .get(&name)
            .cloned()
            .ok_or_else(|| AudioError::IoError(format!("{}: not found", name)))?;
        let size = script.declared_size.unwrap_or(script.pcm_bytes() as u64);
        Ok(ResolvedSource::new(Box::new(Cursor::new(script.encode())), 0, size))
    }
}

#[derive(Default)]
pub struct DecoderStats {
    pub created: AtomicUsize,
    pub seeks: AtomicUsize,
    pub released: AtomicUsize,
}

pub struct ScriptedDecoderFactory {
    pub stats: Arc<DecoderStats>,
}

impl ScriptedDecoderFactory {
    pub fn new() -> Self {
        Self {
            stats: Arc::new(DecoderStats::default()),
        }
    }
}

impl DecoderFactory for ScriptedDecoderFactory {
    fn create(&self) -> Result<Box<dyn DecodeEngine>> {
        self.stats.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedEngine {
            stats: self.stats.clone(),
            script: None,
            next_frame: 0,
            queued: VecDeque::new(),
            input_ended: false,
            decoded_chunks: 0,
        }))
    }
}

/// Decoder that emits ramp PCM in fixed-size chunks
pub struct ScriptedEngine {
    stats: Arc<DecoderStats>,
    script: Option<Script>,
    next_frame: usize,
    queued: VecDeque<(usize, usize)>,
    input_ended: bool,
    decoded_chunks: usize,
}

impl ScriptedEngine {
    fn script(&self) -> Result<&Script> {
        self.script
            .as_ref()
            .ok_or_else(|| AudioError::InvalidState("not negotiated".to_string()))
    }
}

impl DecodeEngine for ScriptedEngine {
    fn negotiate(&mut self, mut source: ResolvedSource) -> Result<StreamFormat> {
        let mut text = String::new();
        source.media.read_to_string(&mut text)?;
        let script = Script::decode(&text)
            .ok_or_else(|| AudioError::UnsupportedFormat("not a scripted clip".to_string()))?;
        if script.fail_negotiate {
            return Err(AudioError::UnsupportedFormat("scripted negotiation failure".to_string()));
        }
        let format = StreamFormat {
            channels: script.channels,
            sample_rate: script.sample_rate,
        };
        self.script = Some(script);
        Ok(format)
    }

    fn pull_compressed(&mut self) -> Result<CompressedChunk> {
        let script = self.script()?;
        if self.next_frame >= script.frames {
            return Ok(CompressedChunk::EndOfStream);
        }
        let count = script.chunk_frames.min(script.frames - self.next_frame);
        let start = self.next_frame;
        self.next_frame += count;

        let mut data = Vec::with_capacity(16);
        data.extend_from_slice(&(start as u64).to_le_bytes());
        data.extend_from_slice(&(count as u64).to_le_bytes());
        Ok(CompressedChunk::Data {
            data: data.into_boxed_slice(),
            timestamp: start as u64,
            duration: count as u64,
        })
    }

    fn push_compressed(&mut self, chunk: CompressedChunk) -> Result<()> {
        match chunk {
            CompressedChunk::Data { data, .. } => {
                let start = u64::from_le_bytes(data[..8].try_into().unwrap()) as usize;
                let count = u64::from_le_bytes(data[8..16].try_into().unwrap()) as usize;
                self.queued.push_back((start, count));
            }
            CompressedChunk::EndOfStream => self.input_ended = true,
        }
        Ok(())
    }

    fn pull_decoded(&mut self, timeout: Duration) -> Result<DecodeOutput> {
        let script = self.script()?.clone();
        if script.stall_after.is_some_and(|n| self.decoded_chunks >= n) {
            thread::sleep(timeout);
            return Ok(DecodeOutput::TryAgain);
        }
        if let Some((start, count)) = self.queued.pop_front() {
            self.decoded_chunks += 1;
            let mut pcm = Vec::with_capacity(count * script.channels as usize * 2);
            for frame in start..start + count {
                for _ in 0..script.channels {
                    pcm.extend_from_slice(&frame_value(frame).to_le_bytes());
                }
            }
            return Ok(DecodeOutput::Pcm(pcm));
        }
        if self.input_ended {
            return Ok(DecodeOutput::EndOfStream);
        }
        Ok(DecodeOutput::TryAgain)
    }

    fn seek_to_start(&mut self) -> Result<()> {
        self.stats.seeks.fetch_add(1, Ordering::SeqCst);
        self.next_frame = 0;
        self.queued.clear();
        self.input_ended = false;
        Ok(())
    }

    fn release(&mut self) {
        self.stats.released.fetch_add(1, Ordering::SeqCst);
        self.script = None;
        self.queued.clear();
    }
}

struct SimState {
    state: SinkState,
    channels: usize,
    capacity_frames: usize,
    queued: VecDeque<i16>,
    position: u64,
    rate: f32,
    volume: (f32, f32),
    segments: Vec<Vec<i16>>,
}

impl SimState {
    fn restart_segment(&mut self) {
        self.queued.clear();
        self.position = 0;
        if self.segments.last().is_some_and(|s| !s.is_empty()) {
            self.segments.push(Vec::new());
        }
    }
}

struct SimShared {
    state: Mutex<SimState>,
    sample_rate: u32,
    released: AtomicBool,
}

/// Sink whose playhead consumes queued frames in real time
pub struct SimSink {
    shared: Arc<SimShared>,
    playhead: Option<JoinHandle<()>>,
}

impl SimSink {
    fn open(spec: SinkSpec) -> Self {
        let channels = spec.channels.max(1) as usize;
        let shared = Arc::new(SimShared {
            state: Mutex::new(SimState {
                state: SinkState::Stopped,
                channels,
                capacity_frames: (spec.buffer_size / (channels * 2)).max(1),
                queued: VecDeque::new(),
                position: 0,
                rate: 1.0,
                volume: (1.0, 1.0),
                segments: vec![Vec::new()],
            }),
            sample_rate: spec.sample_rate,
            released: AtomicBool::new(false),
        });
        let playhead_shared = shared.clone();
        let playhead = thread::spawn(move || run_playhead(playhead_shared));
        Self {
            shared,
            playhead: Some(playhead),
        }
    }
}

fn run_playhead(shared: Arc<SimShared>) {
    let mut last = Instant::now();
    let mut carry = 0.0f64;
    while !shared.released.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(2));
        let now = Instant::now();
        let elapsed = now.duration_since(last).as_secs_f64();
        last = now;

        let mut sim = shared.state.lock();
        if sim.state != SinkState::Playing {
            carry = 0.0;
            continue;
        }
        carry += elapsed * shared.sample_rate as f64 * sim.rate as f64;
        let due = carry as usize;
        let played = due.min(sim.queued.len());
        carry = if played < due { 0.0 } else { carry - due as f64 };
        for _ in 0..played {
            if let Some(value) = sim.queued.pop_front() {
                if let Some(segment) = sim.segments.last_mut() {
                    segment.push(value);
                }
            }
        }
        sim.position += played as u64;
    }
}

impl AudioSink for SimSink {
    fn play(&mut self) -> Result<()> {
        self.shared.state.lock().state = SinkState::Playing;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.shared.state.lock().state = SinkState::Paused;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut sim = self.shared.state.lock();
        sim.state = SinkState::Stopped;
        sim.restart_segment();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.shared.state.lock().restart_segment();
        Ok(())
    }

    fn write(&mut self, pcm: &[u8]) -> Result<usize> {
        let mut sim = self.shared.state.lock();
        let frame_bytes = sim.channels * 2;
        let free = sim.capacity_frames.saturating_sub(sim.queued.len());
        let frames = (pcm.len() / frame_bytes).min(free);
        for frame in pcm.chunks_exact(frame_bytes).take(frames) {
            sim.queued.push_back(i16::from_le_bytes([frame[0], frame[1]]));
        }
        Ok(frames * frame_bytes)
    }

    fn set_volume(&mut self, left: f32, right: f32) -> Result<()> {
        self.shared.state.lock().volume = (left, right);
        Ok(())
    }

    fn set_playback_rate(&mut self, rate: f32) -> Result<()> {
        self.shared.state.lock().rate = rate;
        Ok(())
    }

    fn position_frames(&self) -> u64 {
        self.shared.state.lock().position
    }

    fn play_state(&self) -> SinkState {
        self.shared.state.lock().state
    }

    fn release(&mut self) {
        self.shared.released.store(true, Ordering::SeqCst);
        if let Some(playhead) = self.playhead.take() {
            let _ = playhead.join();
        }
    }
}

impl Drop for SimSink {
    fn drop(&mut self) {
        self.release();
    }
}

/// Read-only view of a sink handed out by [`SimSinkFactory`]
#[derive(Clone)]
pub struct SinkProbe {
    shared: Arc<SimShared>,
}

impl SinkProbe {
    /// Channel-0 values in play order, one entry per flush/stop-delimited segment
    pub fn segments(&self) -> Vec<Vec<i16>> {
        self.shared
            .state
            .lock()
            .segments
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect()
    }

    pub fn played(&self) -> Vec<i16> {
        self.segments().concat()
    }

    pub fn volume(&self) -> (f32, f32) {
        self.shared.state.lock().volume
    }

    pub fn rate(&self) -> f32 {
        self.shared.state.lock().rate
    }

    pub fn capacity_frames(&self) -> usize {
        self.shared.state.lock().capacity_frames
    }

    pub fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::SeqCst)
    }
}

/// Opens [`SimSink`]s; 20 ms minimum buffer
pub struct SimSinkFactory {
    opened: Mutex<Vec<SinkProbe>>,
}

impl SimSinkFactory {
    pub fn new() -> Self {
        Self {
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Sinks in the order samples opened them
    pub fn probes(&self) -> Vec<SinkProbe> {
        self.opened.lock().clone()
    }

    pub fn last(&self) -> Option<SinkProbe> {
        self.opened.lock().last().cloned()
    }
}

impl SinkFactory for SimSinkFactory {
    fn min_buffer_size(&self, sample_rate: u32, channels: u16) -> usize {
        (sample_rate as usize / 50).max(1) * channels.max(1) as usize * 2
    }

    fn open(&self, spec: SinkSpec) -> Result<Box<dyn AudioSink>> {
        let sink = SimSink::open(spec);
        self.opened.lock().push(SinkProbe {
            shared: sink.shared.clone(),
        });
        Ok(Box::new(sink))
    }
}

/// Records every load-complete event
#[derive(Default)]
pub struct TestListener {
    events: Mutex<Vec<LoadEvent>>,
    arrived: Condvar,
}

impl TestListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LoadEvent> {
        self.events.lock().clone()
    }

    pub fn wait_for(&self, id: SampleId, timeout: Duration) -> Option<LoadEvent> {
        let deadline = Instant::now() + timeout;
        let mut events = self.events.lock();
        loop {
            if let Some(event) = events.iter().find(|e| e.sample_id == id) {
                return Some(event.clone());
            }
            if self.arrived.wait_until(&mut events, deadline).timed_out() {
                return None;
            }
        }
    }
}

impl LoadCompleteListener for TestListener {
    fn on_load_complete(&self, event: LoadEvent) {
        self.events.lock().push(event);
        self.arrived.notify_all();
    }
}

/// Pool wired to the fakes
pub struct Harness {
    pub pool: SoundPool,
    pub resolver: Arc<ScriptResolver>,
    pub decoders: Arc<DecoderStats>,
    pub sinks: Arc<SimSinkFactory>,
    pub listener: Arc<TestListener>,
}

impl Harness {
    pub fn new(max_samples: usize) -> Self {
        Self::with_config(PoolConfig {
            decode_stall_limit: Duration::from_millis(300),
            ..PoolConfig::new(max_samples, 100_000)
        })
    }

    pub fn with_config(config: PoolConfig) -> Self {
        init_logger();
        let resolver = Arc::new(ScriptResolver::new());
        let decoder_factory = ScriptedDecoderFactory::new();
        let decoders = decoder_factory.stats.clone();
        let sinks = Arc::new(SimSinkFactory::new());
        let listener = Arc::new(TestListener::new());

        let pool = SoundPool::with_collaborators(
            config,
            resolver.clone(),
            Arc::new(decoder_factory),
            sinks.clone(),
        )
        .unwrap();
        pool.set_load_complete_listener(Some(listener.clone()));

        Self {
            pool,
            resolver,
            decoders,
            sinks,
            listener,
        }
    }

    pub fn resolve(&self, name: &str) -> ResolvedSource {
        self.resolver
            .resolve(SampleSource::Path(name.to_string()))
            .unwrap()
    }

    /// Load a registered clip and wait for its completion event
    pub fn load_ready(&self, name: &str, buffer_size: Option<usize>, is_static: bool) -> SampleId {
        let id = self
            .pool
            .load(name, buffer_size, is_static)
            .expect("load rejected");
        let event = self
            .listener
            .wait_for(id, Duration::from_secs(5))
            .expect("no load event");
        assert!(event.success, "load failed: {:?}", event.error);
        id
    }
}

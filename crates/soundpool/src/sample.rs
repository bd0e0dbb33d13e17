// Playback sample: one clip, its decode session, its sink and the transport state machine
//
// Every mutation of transport state, buffer, decode session and sink happens
// under `inner`. The playback loop holds the lock for one bounded step at a
// time and waits on `wake` (releasing the lock) while the sink is full or
// the tail is draining, so control calls never wait behind decoding.

use crate::worker::WorkerPool;
use parking_lot::{Condvar, Mutex, MutexGuard};
use soundpool_core::{
    is_valid_rate, is_valid_volume, play_count_for_repeat, AudioError, AudioSink, CompressedChunk,
    DecodeEngine, DecodeOutput, DecoderFactory, PoolConfig, ResolvedSource, Result, SampleId,
    SetResult, SinkFactory, SinkSpec, SinkState, StreamFormat, TransportState, INFINITE_PLAYS,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const MIN_DECODE_WAIT: Duration = Duration::from_millis(1);
const MAX_DECODE_WAIT: Duration = Duration::from_millis(32);

/// Per-sample settings derived from the pool configuration
#[derive(Debug, Clone)]
pub struct SampleConfig {
    /// Caller asked for the whole clip to stay in memory
    pub is_static: bool,
    /// Bytes decoded up front before switching to progressive decode
    pub buffer_cap: usize,
    pub static_size_ceiling: u64,
    pub small_file_size: u64,
    pub static_buffer_expansion: usize,
    pub decode_stall_limit: Duration,
    pub write_retry_interval: Duration,
}

impl SampleConfig {
    pub fn derive(pool: &PoolConfig, buffer_size: usize, is_static: bool) -> Self {
        Self {
            is_static,
            buffer_cap: if is_static {
                buffer_size.saturating_mul(2)
            } else {
                buffer_size
            },
            static_size_ceiling: pool.static_size_ceiling,
            small_file_size: pool.small_file_size,
            static_buffer_expansion: pool.static_buffer_expansion,
            decode_stall_limit: pool.decode_stall_limit,
            write_retry_interval: pool.write_retry_interval,
        }
    }
}

/// Escalating wait for decoder output with an upper bound on total stall time
#[derive(Debug)]
struct DecodeWait {
    timeout: Duration,
    stalled_since: Option<Instant>,
}

impl DecodeWait {
    fn new() -> Self {
        Self {
            timeout: MIN_DECODE_WAIT,
            stalled_since: None,
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn progressed(&mut self) {
        self.timeout = MIN_DECODE_WAIT;
        self.stalled_since = None;
    }

    fn stalled(&mut self, limit: Duration) -> Result<()> {
        let since = *self.stalled_since.get_or_insert_with(Instant::now);
        self.timeout = (self.timeout * 2).min(MAX_DECODE_WAIT);
        if since.elapsed() >= limit {
            return Err(AudioError::DecodingError(format!(
                "no decoder output for {} ms",
                limit.as_millis()
            )));
        }
        Ok(())
    }
}

enum Decoded {
    Pcm(Vec<u8>),
    Pending,
    EndOfStream,
}

/// Feed one compressed chunk (until input ends) and ask for output once
fn decode_increment(
    session: &mut dyn DecodeEngine,
    input_done: &mut bool,
    timeout: Duration,
) -> Result<Decoded> {
    if !*input_done {
        let chunk = session.pull_compressed()?;
        if matches!(chunk, CompressedChunk::EndOfStream) {
            *input_done = true;
        }
        session.push_compressed(chunk)?;
    }

    Ok(match session.pull_decoded(timeout)? {
        DecodeOutput::Pcm(pcm) if !pcm.is_empty() => Decoded::Pcm(pcm),
        DecodeOutput::Pcm(_) | DecodeOutput::TryAgain => Decoded::Pending,
        DecodeOutput::EndOfStream => Decoded::EndOfStream,
    })
}

/// Append PCM, growing capacity by an eighth when it does not fit
fn append_pcm(buffer: &mut Vec<u8>, pcm: &[u8]) {
    let needed = buffer.len() + pcm.len();
    if needed > buffer.capacity() {
        let grown = buffer.capacity() + buffer.capacity() / 8;
        buffer.reserve_exact(grown.max(needed) - buffer.len());
    }
    buffer.extend_from_slice(pcm);
}

/// Sink origin: where the sink position last restarted from zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Origin {
    /// Buffer offset written first after the origin
    offset: usize,
    /// Play-throughs completed by the writer since the origin
    passes: u32,
}

/// Buffer offset and play count a fully buffered sample resumes from after
/// the sink played `played` bytes since `origin`
fn resume_point(origin: Origin, played: usize, len: usize, plays_remaining: u32) -> (usize, u32) {
    if len == 0 {
        return (0, plays_remaining);
    }
    let absolute = origin.offset + played;
    let wraps = u32::try_from(absolute / len).unwrap_or(u32::MAX);
    let plays = if plays_remaining == INFINITE_PLAYS {
        INFINITE_PLAYS
    } else {
        plays_remaining.saturating_add(origin.passes).saturating_sub(wraps)
    };
    (absolute % len, plays)
}

/// Offset within a partial initial fill; the decoder continues past it, so
/// reaching the end is not a wrap
fn fill_offset(origin: Origin, played: usize, len: usize) -> usize {
    (origin.offset + played).min(len)
}

/// Position of the writer within one play-through
#[derive(Debug)]
enum Cursor {
    /// Writing buffered PCM from `offset`
    Buffer { offset: usize },
    /// Decoding past the buffer; `pending[written..]` has not reached the sink yet
    Decode { pending: Vec<u8>, written: usize },
    /// Everything handed to the sink, waiting for it to play out
    Drain,
}

fn pass_start(has_buffer: bool) -> Cursor {
    if has_buffer {
        Cursor::Buffer { offset: 0 }
    } else {
        Cursor::Decode {
            pending: Vec::new(),
            written: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    Wait,
    Finished,
    Interrupted,
}

/// What a cursor step asks the loop to do next
enum Advance {
    Step(Step),
    EnterDecode,
    EndOfPass,
    Restart,
}

/// Output of a successful negotiation and initial fill, not yet installed
struct Prepared {
    is_static: bool,
    format: StreamFormat,
    buffer: Vec<u8>,
    fully_buffered: bool,
    session: Option<Box<dyn DecodeEngine>>,
    sink: Box<dyn AudioSink>,
}

struct SampleInner {
    id: SampleId,
    config: SampleConfig,
    is_static: bool,
    state: TransportState,
    closed: bool,
    one_shot_armed: bool,
    generation: u64,
    buffer: Option<Vec<u8>>,
    fully_buffered: bool,
    session: Option<Box<dyn DecodeEngine>>,
    input_done: bool,
    decode_wait: DecodeWait,
    sink: Option<Box<dyn AudioSink>>,
    format: Option<StreamFormat>,
    frame_size: usize,
    plays_remaining: u32,
    paused_offset: usize,
    cursor: Cursor,
    origin: Origin,
    written_frames: u64,
    sink_progress: Option<(u64, Instant)>,
    volume: Option<(f32, f32)>,
    rate: Option<f32>,
}

impl SampleInner {
    fn new(id: SampleId, config: SampleConfig, one_shot: bool) -> Self {
        Self {
            id,
            is_static: config.is_static,
            config,
            state: TransportState::Uninitialized,
            closed: false,
            one_shot_armed: one_shot,
            generation: 0,
            buffer: None,
            fully_buffered: false,
            session: None,
            input_done: false,
            decode_wait: DecodeWait::new(),
            sink: None,
            format: None,
            frame_size: 2,
            plays_remaining: 0,
            paused_offset: 0,
            cursor: Cursor::Drain,
            origin: Origin::default(),
            written_frames: 0,
            sink_progress: None,
            volume: None,
            rate: None,
        }
    }

    fn is_loaded(&self) -> bool {
        !self.closed && self.state.is_loaded()
    }

    fn is_current(&self, generation: u64) -> bool {
        !self.closed && self.generation == generation && self.state == TransportState::Playing
    }

    fn apply_volume(&mut self, left: f32, right: f32) -> bool {
        if self.volume == Some((left, right)) {
            return true;
        }
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.set_volume(left, right) {
                log::warn!("[sample {}] set_volume failed: {}", self.id, e);
                return false;
            }
        }
        self.volume = Some((left, right));
        true
    }

    fn apply_rate(&mut self, rate: f32) -> bool {
        if self.rate == Some(rate) {
            return true;
        }
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.set_playback_rate(rate) {
                log::warn!("[sample {}] set_playback_rate failed: {}", self.id, e);
                return false;
            }
        }
        self.rate = Some(rate);
        true
    }

    /// Validate and arm a fresh play-through; returns the run generation
    fn begin_play(&mut self, left: f32, right: f32, repeat: i32, rate: f32) -> Option<u64> {
        if !self.is_loaded() || self.state == TransportState::Playing {
            return None;
        }
        let plays = play_count_for_repeat(repeat)?;
        if !is_valid_volume(left) || !is_valid_volume(right) || !is_valid_rate(rate) {
            log::debug!(
                "[sample {}] play rejected: volume=({}, {}) rate={}",
                self.id,
                left,
                right,
                rate
            );
            return None;
        }

        if self.state == TransportState::Paused {
            if let Err(e) = self.rewind() {
                log::warn!("[sample {}] rewind before play failed: {}", self.id, e);
                self.close_resources();
                return None;
            }
        }

        if !self.apply_volume(left, right) || !self.apply_rate(rate) {
            return None;
        }
        self.plays_remaining = plays;
        self.origin = Origin::default();
        self.written_frames = 0;
        self.sink_progress = None;
        self.state = TransportState::Playing;
        self.generation += 1;
        Some(self.generation)
    }

    fn ensure_sink_playing(&mut self) -> Result<()> {
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| AudioError::InvalidState("sink released".to_string()))?;
        if sink.play_state() != SinkState::Playing {
            sink.play()?;
        }
        Ok(())
    }

    /// Halt the sink and put the writer back at byte 0 of the clip
    fn rewind(&mut self) -> Result<()> {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.stop() {
                log::warn!("[sample {}] sink stop failed: {}", self.id, e);
            }
        }
        // Without a buffer the session is the only way back to the start
        if self.buffer.is_none() {
            if let Some(session) = self.session.as_mut() {
                session.seek_to_start()?;
            }
            self.input_done = false;
        }
        self.decode_wait.progressed();
        self.cursor = pass_start(self.buffer.is_some());
        self.paused_offset = 0;
        self.origin = Origin::default();
        self.written_frames = 0;
        self.sink_progress = None;
        self.state = TransportState::Stopped;
        Ok(())
    }

    fn pause_playback(&mut self) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        if let Err(e) = sink.pause() {
            log::warn!("[sample {}] sink pause failed: {}", self.id, e);
        }

        // Buffered PCM can be re-written from the exact played offset; PCM
        // decoded past the buffer only exists in the sink, so it stays queued
        let rewritable = self.fully_buffered || matches!(self.cursor, Cursor::Buffer { .. });
        if let (true, Some(buffer)) = (rewritable, self.buffer.as_ref()) {
            let played_frames = sink.position_frames().min(self.written_frames);
            let played = played_frames as usize * self.frame_size;
            let (offset, plays) = if self.fully_buffered {
                resume_point(self.origin, played, buffer.len(), self.plays_remaining)
            } else {
                (fill_offset(self.origin, played, buffer.len()), self.plays_remaining)
            };
            if let Err(e) = sink.flush() {
                log::warn!("[sample {}] sink flush failed: {}", self.id, e);
            }

            self.paused_offset = offset;
            self.plays_remaining = plays;
            self.cursor = if plays == 0 {
                Cursor::Drain
            } else {
                Cursor::Buffer { offset }
            };
            self.origin = Origin { offset, passes: 0 };
            self.written_frames = 0;
        }
        self.sink_progress = None;
        self.state = TransportState::Paused;
    }

    fn end_pass(&mut self) -> Step {
        if self.plays_remaining != INFINITE_PLAYS {
            self.plays_remaining = self.plays_remaining.saturating_sub(1);
        }
        self.origin.passes = self.origin.passes.saturating_add(1);
        self.cursor = if self.plays_remaining == 0 {
            Cursor::Drain
        } else {
            pass_start(self.buffer.is_some())
        };
        Step::Continue
    }

    /// One bounded unit of playback work
    fn step(&mut self) -> Result<Step> {
        let frame_size = self.frame_size.max(1);
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| AudioError::InvalidState("sink released".to_string()))?;
        if sink.play_state() != SinkState::Playing {
            return Ok(Step::Interrupted);
        }

        let advance = match &mut self.cursor {
            Cursor::Buffer { offset } => {
                let buffer = self.buffer.as_deref().unwrap_or(&[]);
                if *offset < buffer.len() {
                    let accepted = sink.write(&buffer[*offset..])?;
                    if accepted == 0 {
                        Advance::Step(Step::Wait)
                    } else {
                        *offset += accepted;
                        self.written_frames += (accepted / frame_size) as u64;
                        Advance::Step(Step::Continue)
                    }
                } else if self.fully_buffered {
                    Advance::EndOfPass
                } else {
                    Advance::EnterDecode
                }
            }
            Cursor::Decode { pending, written } => {
                if *written < pending.len() {
                    let accepted = sink.write(&pending[*written..])?;
                    if accepted == 0 {
                        Advance::Step(Step::Wait)
                    } else {
                        *written += accepted;
                        self.written_frames += (accepted / frame_size) as u64;
                        Advance::Step(Step::Continue)
                    }
                } else {
                    let session = self
                        .session
                        .as_mut()
                        .ok_or_else(|| AudioError::InvalidState("decode session released".to_string()))?;
                    match decode_increment(session.as_mut(), &mut self.input_done, self.decode_wait.timeout())? {
                        Decoded::Pcm(pcm) => {
                            self.decode_wait.progressed();
                            if let Some(buffer) = self.buffer.as_mut() {
                                append_pcm(buffer, &pcm);
                            }
                            *pending = pcm;
                            *written = 0;
                            Advance::Step(Step::Continue)
                        }
                        Decoded::Pending => {
                            self.decode_wait.stalled(self.config.decode_stall_limit)?;
                            Advance::Step(Step::Continue)
                        }
                        Decoded::EndOfStream => {
                            if self.buffer.is_some() {
                                // Everything decoded is now retained
                                self.fully_buffered = true;
                                if let Some(mut session) = self.session.take() {
                                    session.release();
                                }
                                log::debug!("[sample {}] fully buffered during playback", self.id);
                            } else {
                                session.seek_to_start()?;
                                self.input_done = false;
                            }
                            Advance::EndOfPass
                        }
                    }
                }
            }
            Cursor::Drain => {
                if self.plays_remaining > 0 {
                    Advance::Restart
                } else if sink.position_frames() >= self.written_frames {
                    Advance::Step(Step::Finished)
                } else {
                    Advance::Step(Step::Wait)
                }
            }
        };

        Ok(match advance {
            Advance::Step(step) => step,
            Advance::EnterDecode => {
                if !self.is_static {
                    // Streaming mode keeps no PCM past the first pass
                    self.buffer = None;
                }
                self.cursor = Cursor::Decode {
                    pending: Vec::new(),
                    written: 0,
                };
                Step::Continue
            }
            Advance::EndOfPass => self.end_pass(),
            Advance::Restart => {
                self.cursor = pass_start(self.buffer.is_some());
                Step::Continue
            }
        })
    }

    /// Fail if the sink position has not moved for the stall limit
    fn watch_sink_progress(&mut self) -> Result<()> {
        let position = self.sink.as_ref().map(|s| s.position_frames()).unwrap_or(0);
        match self.sink_progress {
            Some((last, since)) if last == position => {
                if since.elapsed() >= self.config.decode_stall_limit {
                    return Err(AudioError::PlaybackError(format!(
                        "sink stuck at frame {}",
                        position
                    )));
                }
            }
            _ => self.sink_progress = Some((position, Instant::now())),
        }
        Ok(())
    }

    fn finish_playback(&mut self) {
        if let Err(e) = self.rewind() {
            log::warn!("[sample {}] rewind after playback failed: {}", self.id, e);
            self.close_resources();
        }
    }

    fn fail_playback(&mut self, error: AudioError) {
        match error {
            AudioError::DecodingError(_) | AudioError::UnsupportedFormat(_) => {
                log::error!("[sample {}] decode failed during playback: {}", self.id, error);
                self.close_resources();
            }
            _ => {
                log::warn!("[sample {}] playback stopped: {}", self.id, error);
                self.finish_playback();
            }
        }
    }

    fn close_resources(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.stop() {
                log::debug!("[sample {}] sink stop on close: {}", self.id, e);
            }
            sink.release();
        }
        if let Some(mut session) = self.session.take() {
            session.release();
        }
        self.buffer = None;
        self.cursor = Cursor::Drain;
        self.one_shot_armed = false;
        self.closed = true;
        self.generation += 1;
    }
}

/// One loadable, independently controllable clip
pub struct PlaybackSample {
    id: SampleId,
    one_shot: bool,
    closing: AtomicBool,
    inner: Mutex<SampleInner>,
    wake: Condvar,
}

impl PlaybackSample {
    pub fn new(id: SampleId, config: SampleConfig) -> Self {
        Self::with_mode(id, config, false)
    }

    /// Sample driven by `play_once`: it reports playing until its single
    /// play-through ends, and pausing it is terminal
    pub fn new_one_shot(id: SampleId, config: SampleConfig) -> Self {
        Self::with_mode(id, config, true)
    }

    fn with_mode(id: SampleId, config: SampleConfig, one_shot: bool) -> Self {
        Self {
            id,
            one_shot,
            closing: AtomicBool::new(false),
            inner: Mutex::new(SampleInner::new(id, config, one_shot)),
            wake: Condvar::new(),
        }
    }

    pub fn id(&self) -> SampleId {
        self.id
    }

    /// Negotiate the stream, decode the initial fill and open the sink.
    ///
    /// Decoding runs without the sample lock; the result is installed
    /// atomically. Any failure closes the sample.
    pub fn load(
        &self,
        source: ResolvedSource,
        decoders: &dyn DecoderFactory,
        sinks: &dyn SinkFactory,
    ) -> Result<()> {
        let config = {
            let inner = self.inner.lock();
            if inner.closed || inner.state != TransportState::Uninitialized {
                return Err(AudioError::InvalidState(format!(
                    "sample {} is not loadable",
                    self.id
                )));
            }
            inner.config.clone()
        };

        let prepared = match self.prepare(source, &config, decoders, sinks) {
            Ok(prepared) => prepared,
            Err(e) => {
                log::warn!("[sample {}] load failed: {}", self.id, e);
                self.close();
                return Err(e);
            }
        };
        self.install(prepared)
    }

    fn prepare(
        &self,
        source: ResolvedSource,
        config: &SampleConfig,
        decoders: &dyn DecoderFactory,
        sinks: &dyn SinkFactory,
    ) -> Result<Prepared> {
        let source_size = source.size;
        let is_static = config.is_static && source_size < config.static_size_ceiling;
        if config.is_static && !is_static {
            log::debug!(
                "[sample {}] {} bytes exceeds static ceiling, streaming instead",
                self.id,
                source_size
            );
        }

        let mut session = decoders.create()?;
        let (format, buffer, fully_buffered) =
            match self.negotiate_and_fill(session.as_mut(), source, config, is_static) {
                Ok(filled) => filled,
                Err(e) => {
                    session.release();
                    return Err(e);
                }
            };

        let session = if fully_buffered {
            session.release();
            None
        } else {
            Some(session)
        };

        let min_size = sinks.min_buffer_size(format.sample_rate, format.channels);
        let buffer_size = if fully_buffered && source_size < config.small_file_size {
            min_size
        } else {
            min_size * 2
        };
        let sink = match sinks.open(SinkSpec {
            buffer_size,
            channels: format.channels,
            sample_rate: format.sample_rate,
        }) {
            Ok(sink) => sink,
            Err(e) => {
                if let Some(mut session) = session {
                    session.release();
                }
                return Err(e);
            }
        };

        Ok(Prepared {
            is_static,
            format,
            buffer,
            fully_buffered,
            session,
            sink,
        })
    }

    fn negotiate_and_fill(
        &self,
        session: &mut dyn DecodeEngine,
        source: ResolvedSource,
        config: &SampleConfig,
        is_static: bool,
    ) -> Result<(StreamFormat, Vec<u8>, bool)> {
        let source_size = source.size;
        let format = session.negotiate(source)?;
        if format.channels == 0 || format.sample_rate == 0 {
            return Err(AudioError::UnsupportedFormat(format!(
                "unusable stream format {:?}",
                format
            )));
        }

        let initial_capacity = if is_static {
            (source_size as usize).saturating_mul(config.static_buffer_expansion)
        } else {
            config.buffer_cap + config.buffer_cap / 8
        };
        let mut buffer = Vec::with_capacity(initial_capacity.max(format.frame_size()));
        let mut input_done = false;
        let mut wait = DecodeWait::new();

        let fully_buffered = loop {
            if self.closing.load(Ordering::SeqCst) {
                return Err(AudioError::InvalidState("closed during load".to_string()));
            }
            match decode_increment(session, &mut input_done, wait.timeout())? {
                Decoded::Pcm(pcm) => {
                    wait.progressed();
                    append_pcm(&mut buffer, &pcm);
                    if buffer.len() > config.buffer_cap {
                        break false;
                    }
                }
                Decoded::Pending => wait.stalled(config.decode_stall_limit)?,
                Decoded::EndOfStream => break true,
            }
        };

        Ok((format, buffer, fully_buffered))
    }

    fn install(&self, prepared: Prepared) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.closed || self.closing.load(Ordering::SeqCst) {
            let Prepared {
                session, mut sink, ..
            } = prepared;
            sink.release();
            if let Some(mut session) = session {
                session.release();
            }
            return Err(AudioError::InvalidState("closed during load".to_string()));
        }

        let buffered = prepared.buffer.len();
        inner.is_static = prepared.is_static;
        inner.format = Some(prepared.format);
        inner.frame_size = prepared.format.frame_size();
        inner.buffer = Some(prepared.buffer);
        inner.fully_buffered = prepared.fully_buffered;
        inner.session = prepared.session;
        inner.input_done = false;
        inner.sink = Some(prepared.sink);
        inner.cursor = Cursor::Buffer { offset: 0 };
        inner.state = TransportState::Stopped;

        log::info!(
            "[sample {}] loaded: {} Hz, {} ch, {} bytes buffered, fully_buffered={}, static={}",
            self.id,
            prepared.format.sample_rate,
            prepared.format.channels,
            buffered,
            prepared.fully_buffered,
            prepared.is_static
        );
        Ok(())
    }

    /// Start playback from byte 0 on a worker.
    /// `repeat`: 0 plays once, N plays N+1 times, -1 loops forever.
    pub fn play(
        self: &Arc<Self>,
        left: f32,
        right: f32,
        repeat: i32,
        rate: f32,
        workers: &WorkerPool,
    ) -> bool {
        let generation = {
            let mut inner = self.inner.lock();
            match inner.begin_play(left, right, repeat, rate) {
                Some(generation) => generation,
                None => return false,
            }
        };
        self.wake.notify_all();
        log::debug!("[sample {}] play repeat={} rate={}", self.id, repeat, rate);
        self.spawn_playback(generation, workers)
    }

    /// Play a one-shot sample once on the calling thread, returning when done
    pub fn play_one_shot(&self, left: f32, right: f32, rate: f32) -> bool {
        let generation = {
            let mut inner = self.inner.lock();
            if !inner.one_shot_armed {
                return false;
            }
            inner.one_shot_armed = false;
            match inner.begin_play(left, right, 0, rate) {
                Some(generation) => generation,
                None => return false,
            }
        };
        self.run_playback(generation);
        true
    }

    fn spawn_playback(self: &Arc<Self>, generation: u64, workers: &WorkerPool) -> bool {
        let sample = self.clone();
        if workers.execute(move || sample.run_playback(generation)) {
            return true;
        }
        log::warn!("[sample {}] no worker available, stopping", self.id);
        self.stop();
        false
    }

    pub fn pause(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            return false;
        }

        if self.one_shot {
            let was_active = inner.one_shot_armed || inner.state == TransportState::Playing;
            inner.one_shot_armed = false;
            if inner.state == TransportState::Playing {
                inner.plays_remaining = 0;
                inner.generation += 1;
                inner.finish_playback();
            }
            drop(inner);
            self.wake.notify_all();
            if was_active {
                log::debug!("[sample {}] one-shot paused, cancelling", self.id);
            }
            return was_active;
        }

        if inner.state != TransportState::Playing {
            return false;
        }
        inner.pause_playback();
        let offset = inner.paused_offset;
        drop(inner);
        self.wake.notify_all();
        log::debug!("[sample {}] paused at byte {}", self.id, offset);
        true
    }

    pub fn resume(self: &Arc<Self>, workers: &WorkerPool) -> bool {
        let generation = {
            let mut inner = self.inner.lock();
            if inner.closed || inner.state != TransportState::Paused {
                return false;
            }
            inner.state = TransportState::Playing;
            inner.paused_offset = 0;
            inner.sink_progress = None;
            inner.generation += 1;
            inner.generation
        };
        self.wake.notify_all();
        log::debug!("[sample {}] resume", self.id);
        self.spawn_playback(generation, workers)
    }

    pub fn stop(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            return false;
        }
        let cancelled = self.one_shot && inner.one_shot_armed;
        inner.one_shot_armed = false;

        if !matches!(
            inner.state,
            TransportState::Playing | TransportState::Paused
        ) {
            return cancelled;
        }

        inner.generation += 1;
        if let Err(e) = inner.rewind() {
            log::warn!("[sample {}] rewind on stop failed, closing: {}", self.id, e);
            inner.close_resources();
        }
        drop(inner);
        self.wake.notify_all();
        log::debug!("[sample {}] stopped", self.id);
        true
    }

    /// Halt the sink, release the session and buffer; idempotent
    pub fn close(&self) {
        self.closing.store(true, Ordering::SeqCst);
        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }
        inner.close_resources();
        drop(inner);
        self.wake.notify_all();
        log::debug!("[sample {}] closed", self.id);
    }

    pub fn set_volume(&self, left: f32, right: f32) -> SetResult {
        let mut inner = self.inner.lock();
        if !inner.is_loaded() {
            return SetResult::InvalidOperation;
        }
        if !is_valid_volume(left) || !is_valid_volume(right) {
            return SetResult::InvalidValue;
        }
        if inner.apply_volume(left, right) {
            SetResult::Success
        } else {
            SetResult::InvalidOperation
        }
    }

    pub fn set_rate(&self, rate: f32) -> SetResult {
        let mut inner = self.inner.lock();
        if !inner.is_loaded() {
            return SetResult::InvalidOperation;
        }
        if !is_valid_rate(rate) {
            return SetResult::InvalidValue;
        }
        if inner.apply_rate(rate) {
            SetResult::Success
        } else {
            SetResult::InvalidOperation
        }
    }

    pub fn set_loop(&self, repeat: i32) -> SetResult {
        let mut inner = self.inner.lock();
        if !inner.is_loaded() {
            return SetResult::InvalidOperation;
        }
        let Some(plays) = play_count_for_repeat(repeat) else {
            return SetResult::InvalidValue;
        };
        inner.plays_remaining = plays;
        drop(inner);
        self.wake.notify_all();
        SetResult::Success
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.lock().is_loaded()
    }

    pub fn is_playing(&self) -> bool {
        let inner = self.inner.lock();
        !inner.closed && (inner.state == TransportState::Playing || inner.one_shot_armed)
    }

    pub fn is_paused(&self) -> bool {
        let inner = self.inner.lock();
        !inner.closed && inner.state == TransportState::Paused
    }

    pub fn is_stopped(&self) -> bool {
        let inner = self.inner.lock();
        !inner.closed && inner.state == TransportState::Stopped && !inner.one_shot_armed
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn is_fully_buffered(&self) -> bool {
        self.inner.lock().fully_buffered
    }

    /// Static mode after the size ceiling was applied at load
    pub fn is_static(&self) -> bool {
        self.inner.lock().is_static
    }

    pub fn buffered_bytes(&self) -> usize {
        self.inner.lock().buffer.as_ref().map_or(0, Vec::len)
    }

    /// Byte offset playback resumes from, while paused
    pub fn paused_offset(&self) -> usize {
        self.inner.lock().paused_offset
    }

    pub fn format(&self) -> Option<StreamFormat> {
        self.inner.lock().format
    }

    /// Playback loop body; exits as soon as `generation` is superseded
    pub(crate) fn run_playback(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if !inner.is_current(generation) {
            return;
        }
        if let Err(e) = inner.ensure_sink_playing() {
            inner.fail_playback(e);
            drop(inner);
            self.wake.notify_all();
            return;
        }

        loop {
            if !inner.is_current(generation) {
                break;
            }
            match inner.step() {
                Ok(Step::Continue) => {
                    inner.sink_progress = None;
                    MutexGuard::bump(&mut inner);
                }
                Ok(Step::Wait) => {
                    if let Err(e) = inner.watch_sink_progress() {
                        inner.fail_playback(e);
                        break;
                    }
                    let interval = inner.config.write_retry_interval;
                    self.wake.wait_for(&mut inner, interval);
                }
                Ok(Step::Finished) => {
                    log::debug!("[sample {}] playback finished", self.id);
                    inner.finish_playback();
                    break;
                }
                Ok(Step::Interrupted) => {
                    log::warn!("[sample {}] sink left the playing state", self.id);
                    inner.finish_playback();
                    break;
                }
                Err(e) => {
                    inner.fail_playback(e);
                    break;
                }
            }
        }
        drop(inner);
        self.wake.notify_all();
    }
}

impl std::fmt::Debug for PlaybackSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("PlaybackSample")
            .field("id", &self.id)
            .field("state", &inner.state)
            .field("closed", &inner.closed)
            .field("fully_buffered", &inner.fully_buffered)
            .field("one_shot", &self.one_shot)
            .finish()
    }
}

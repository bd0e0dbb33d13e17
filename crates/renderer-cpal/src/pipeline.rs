// State shared between a sink and its output callback

use parking_lot::Mutex;
use soundpool_core::SinkState;
use soundpool_resampler::StreamResampler;
use soundpool_ringbuffer::SharedPcmRing;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

const STATE_STOPPED: u8 = 0;
const STATE_PAUSED: u8 = 1;
const STATE_PLAYING: u8 = 2;

/// Frames consumed by the callback, tagged with the flush generation they belong to
#[derive(Debug, Default)]
struct PlayCounters {
    generation: u64,
    frames: u64,
}

/// Sink-side view of the output: PCM queue, transport flags and mix parameters
pub struct SinkShared {
    ring: SharedPcmRing,
    channels: u16,
    playing: AtomicBool,
    state: AtomicU8,
    counters: Mutex<PlayCounters>,
    volume: Mutex<(f32, f32)>,
    rate_bits: AtomicU32,
}

impl SinkShared {
    /// `capacity` is in samples and is rounded down to whole frames
    pub fn new(capacity: usize, channels: u16) -> Self {
        let channels = channels.max(1);
        let frames = (capacity / channels as usize).max(1);
        Self {
            ring: SharedPcmRing::new(frames * channels as usize),
            channels,
            playing: AtomicBool::new(false),
            state: AtomicU8::new(STATE_STOPPED),
            counters: Mutex::new(PlayCounters::default()),
            volume: Mutex::new((1.0, 1.0)),
            rate_bits: AtomicU32::new(1.0f32.to_bits()),
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Queue little-endian 16-bit PCM, accepting only whole frames that fit
    pub fn write_pcm(&self, pcm: &[u8]) -> usize {
        let channels = self.channels as usize;
        let frame_bytes = channels * 2;
        let free_frames = self.ring.available_write() / channels;
        let frames = (pcm.len() / frame_bytes).min(free_frames);
        if frames == 0 {
            return 0;
        }

        let bytes = frames * frame_bytes;
        let samples: Vec<i16> = pcm[..bytes]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        let written = self.ring.write(&samples);
        (written / channels) * frame_bytes
    }

    /// Drop queued PCM and restart the position count
    pub fn flush(&self) {
        let mut counters = self.counters.lock();
        counters.generation += 1;
        counters.frames = 0;
        self.ring.clear();
    }

    pub fn position_frames(&self) -> u64 {
        self.counters.lock().frames
    }

    pub fn queued_frames(&self) -> usize {
        self.ring.available_read() / self.channels as usize
    }

    pub fn set_state(&self, state: SinkState) {
        let (raw, playing) = match state {
            SinkState::Stopped => (STATE_STOPPED, false),
            SinkState::Paused => (STATE_PAUSED, false),
            SinkState::Playing => (STATE_PLAYING, true),
        };
        self.state.store(raw, Ordering::SeqCst);
        self.playing.store(playing, Ordering::SeqCst);
    }

    pub fn state(&self) -> SinkState {
        match self.state.load(Ordering::SeqCst) {
            STATE_PLAYING => SinkState::Playing,
            STATE_PAUSED => SinkState::Paused,
            _ => SinkState::Stopped,
        }
    }

    pub fn set_volume(&self, left: f32, right: f32) {
        *self.volume.lock() = (left.clamp(0.0, 1.0), right.clamp(0.0, 1.0));
    }

    pub fn volume(&self) -> (f32, f32) {
        *self.volume.lock()
    }

    pub fn set_playback_rate(&self, rate: f32) {
        self.rate_bits.store(rate.to_bits(), Ordering::SeqCst);
    }

    fn playback_rate(&self) -> f32 {
        f32::from_bits(self.rate_bits.load(Ordering::SeqCst))
    }
}

/// Render side, owned by the output callback
pub struct OutputPipeline {
    shared: Arc<SinkShared>,
    resampler: StreamResampler,
    output_channels: u16,
    applied_rate: f32,
    generation: u64,
    underflows: u64,
}

impl OutputPipeline {
    pub fn new(shared: Arc<SinkShared>, source_rate: u32, device_rate: u32, device_channels: u16) -> Self {
        let output_channels = device_channels.max(1);
        let resampler = StreamResampler::new(source_rate, device_rate, shared.channels(), output_channels);
        Self {
            shared,
            resampler,
            output_channels,
            applied_rate: 1.0,
            generation: 0,
            underflows: 0,
        }
    }

    /// Fill one device buffer of interleaved f32 samples
    pub fn render(&mut self, data: &mut [f32]) {
        if !self.shared.playing.load(Ordering::SeqCst) {
            data.fill(0.0);
            return;
        }

        let generation = self.shared.counters.lock().generation;
        if generation != self.generation {
            self.resampler.reset();
            self.generation = generation;
        }

        let rate = self.shared.playback_rate();
        if rate != self.applied_rate {
            self.resampler.set_playback_rate(rate);
            self.applied_rate = rate;
        }

        let ring = &self.shared.ring;
        let stats = self.resampler.render(data, |frame| ring.read_frame(frame));

        {
            let mut counters = self.shared.counters.lock();
            // A flush during the render invalidates what was consumed
            if counters.generation == generation {
                counters.frames += stats.consumed;
            }
        }

        let out_channels = self.output_channels as usize;
        if stats.produced < data.len() / out_channels && stats.consumed > 0 {
            self.underflows += 1;
            if self.underflows % 50 == 0 {
                log::debug!("[output] underflow count={}", self.underflows);
            }
        }

        let (left, right) = *self.shared.volume.lock();
        if left == 1.0 && right == 1.0 {
            return;
        }
        let center = (left + right) * 0.5;
        for frame in data.chunks_exact_mut(out_channels) {
            if out_channels == 1 {
                frame[0] *= center;
                continue;
            }
            for (ch, sample) in frame.iter_mut().enumerate() {
                *sample *= match ch {
                    0 => left,
                    1 => right,
                    _ => center,
                };
            }
        }
    }
}

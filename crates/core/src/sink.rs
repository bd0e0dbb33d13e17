// Audio sink abstraction layer

use crate::error::Result;

/// Transport state reported by a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Stopped,
    Paused,
    Playing,
}

/// Sink configuration, PCM is always interleaved 16-bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkSpec {
    /// Write buffer size in bytes
    pub buffer_size: usize,
    pub channels: u16,
    pub sample_rate: u32,
}

/// PCM playback primitive owned by one sample
pub trait AudioSink: Send {
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    /// Halt playback, discard queued PCM and reset the position
    fn stop(&mut self) -> Result<()>;

    /// Discard queued PCM and reset the position, keeping the transport state
    fn flush(&mut self) -> Result<()>;

    /// Queue PCM without blocking; returns the number of bytes accepted.
    /// Only whole frames are accepted.
    fn write(&mut self, pcm: &[u8]) -> Result<usize>;

    /// Set per-channel gain (0.0 - 1.0)
    fn set_volume(&mut self, left: f32, right: f32) -> Result<()>;

    /// Set playback rate relative to the source rate (1.0 = normal)
    fn set_playback_rate(&mut self, rate: f32) -> Result<()>;

    /// Frames played since the last `flush` or `stop`
    fn position_frames(&self) -> u64;

    fn play_state(&self) -> SinkState;

    /// Release the output stream
    fn release(&mut self);
}

/// Creates sinks for negotiated formats
pub trait SinkFactory: Send + Sync {
    /// Minimum write buffer in bytes for 16-bit PCM at this format
    fn min_buffer_size(&self, sample_rate: u32, channels: u16) -> usize;

    fn open(&self, spec: SinkSpec) -> Result<Box<dyn AudioSink>>;
}

// cpal output stream driven from a dedicated owner thread

use crate::pipeline::{OutputPipeline, SinkShared};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Stream;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use soundpool_core::{AudioError, AudioSink, Result, SinkFactory, SinkSpec, SinkState};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Opens [`CpalSink`]s on the default output device
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalSinkFactory;

impl CpalSinkFactory {
    pub fn new() -> Self {
        Self
    }
}

impl SinkFactory for CpalSinkFactory {
    /// 100 ms of 16-bit PCM
    fn min_buffer_size(&self, sample_rate: u32, channels: u16) -> usize {
        (sample_rate as usize / 10).max(1) * channels.max(1) as usize * 2
    }

    fn open(&self, spec: SinkSpec) -> Result<Box<dyn AudioSink>> {
        Ok(Box::new(CpalSink::open(spec)?))
    }
}

enum Command {
    Play(Sender<Result<()>>),
    Pause(Sender<Result<()>>),
    Shutdown,
}

/// PCM sink backed by a cpal output stream.
///
/// The stream is created, driven and dropped on its own thread since it
/// is not `Send` on every platform.
pub struct CpalSink {
    shared: Arc<SinkShared>,
    commands: Sender<Command>,
    thread: Option<JoinHandle<()>>,
}

impl CpalSink {
    pub fn open(spec: SinkSpec) -> Result<Self> {
        let channels = spec.channels.max(1);
        let capacity = (spec.buffer_size / 2).max(channels as usize);
        let shared = Arc::new(SinkShared::new(capacity, channels));

        let (init_tx, init_rx) = bounded(1);
        let (cmd_tx, cmd_rx) = unbounded();
        let thread_shared = shared.clone();
        let thread = thread::Builder::new()
            .name("soundpool-output".to_string())
            .spawn(move || run_output_thread(spec, thread_shared, init_tx, cmd_rx))
            .map_err(|e| AudioError::InitializationError(format!("spawn output thread: {}", e)))?;

        let (device_rate, device_channels) = init_rx
            .recv()
            .map_err(|_| AudioError::DeviceError("output thread exited during setup".to_string()))??;
        log::debug!(
            "[output] sink {} Hz/{} ch on device {} Hz/{} ch, {} samples queued max",
            spec.sample_rate,
            channels,
            device_rate,
            device_channels,
            capacity
        );

        Ok(Self {
            shared,
            commands: cmd_tx,
            thread: Some(thread),
        })
    }

    fn request(&self, make: impl FnOnce(Sender<Result<()>>) -> Command) -> Result<()> {
        let (reply_tx, reply_rx) = bounded(1);
        self.commands
            .send(make(reply_tx))
            .map_err(|_| AudioError::DeviceError("output thread is gone".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| AudioError::DeviceError("output thread is gone".to_string()))?
    }
}

fn run_output_thread(
    spec: SinkSpec,
    shared: Arc<SinkShared>,
    init: Sender<Result<(u32, u16)>>,
    commands: Receiver<Command>,
) {
    let (stream, device_rate, device_channels) = match build_stream(&spec, shared) {
        Ok(built) => built,
        Err(e) => {
            let _ = init.send(Err(e));
            return;
        }
    };
    if init.send(Ok((device_rate, device_channels))).is_err() {
        return;
    }

    for command in commands.iter() {
        match command {
            Command::Play(reply) => {
                let result = stream
                    .play()
                    .map_err(|e| AudioError::PlaybackError(format!("Failed to start stream: {}", e)));
                let _ = reply.send(result);
            }
            Command::Pause(reply) => {
                let result = stream
                    .pause()
                    .map_err(|e| AudioError::PlaybackError(format!("Failed to pause stream: {}", e)));
                let _ = reply.send(result);
            }
            Command::Shutdown => break,
        }
    }

    drop(stream);
    log::debug!("[output] stream closed");
}

fn build_stream(spec: &SinkSpec, shared: Arc<SinkShared>) -> Result<(Stream, u32, u16)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AudioError::DeviceError("no default output device".into()))?;
    let config = device
        .default_output_config()
        .map_err(|e| AudioError::DeviceError(format!("output config failed: {}", e)))?;

    if config.sample_format() != cpal::SampleFormat::F32 {
        return Err(AudioError::UnsupportedFormat(
            "Only f32 sample format supported".into(),
        ));
    }

    let device_rate = config.sample_rate().0;
    let device_channels = config.channels();
    let mut pipeline = OutputPipeline::new(shared, spec.sample_rate, device_rate, device_channels);

    let stream = device
        .build_output_stream(
            &config.config(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| pipeline.render(data),
            |err| log::error!("[output] stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::InitializationError(format!("Failed to build output stream: {}", e)))?;

    Ok((stream, device_rate, device_channels))
}

impl AudioSink for CpalSink {
    fn play(&mut self) -> Result<()> {
        self.request(Command::Play)?;
        self.shared.set_state(SinkState::Playing);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.shared.set_state(SinkState::Paused);
        self.request(Command::Pause)
    }

    fn stop(&mut self) -> Result<()> {
        self.shared.set_state(SinkState::Stopped);
        self.shared.flush();
        self.request(Command::Pause)
    }

    fn flush(&mut self) -> Result<()> {
        self.shared.flush();
        Ok(())
    }

    fn write(&mut self, pcm: &[u8]) -> Result<usize> {
        Ok(self.shared.write_pcm(pcm))
    }

    fn set_volume(&mut self, left: f32, right: f32) -> Result<()> {
        self.shared.set_volume(left, right);
        Ok(())
    }

    fn set_playback_rate(&mut self, rate: f32) -> Result<()> {
        if !(rate > 0.0 && rate.is_finite()) {
            return Err(AudioError::PlaybackError(format!("invalid playback rate {}", rate)));
        }
        self.shared.set_playback_rate(rate);
        Ok(())
    }

    fn position_frames(&self) -> u64 {
        self.shared.position_frames()
    }

    fn play_state(&self) -> SinkState {
        self.shared.state()
    }

    fn release(&mut self) {
        self.shared.set_state(SinkState::Stopped);
        if let Some(thread) = self.thread.take() {
            let _ = self.commands.send(Command::Shutdown);
            if thread.join().is_err() {
                log::warn!("[output] output thread panicked");
            }
        }
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_buffer_is_100ms_of_pcm16() {
        let factory = CpalSinkFactory::new();
        assert_eq!(factory.min_buffer_size(44_100, 2), 4410 * 4);
        assert_eq!(factory.min_buffer_size(8_000, 1), 1600);
    }
}

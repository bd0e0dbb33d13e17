// Streaming rate and channel conversion for the output callback

/// Linear-interpolating resampler that pulls input frames on demand.
///
/// The step is `input_rate * playback_rate / output_rate` input frames per
/// output frame, so playback rate changes pitch and speed together.
pub struct StreamResampler {
    input_channels: u16,
    output_channels: u16,
    input_rate: u32,
    output_rate: u32,
    playback_rate: f32,
    step: f64,
    frac: f64,
    prev: Vec<f32>,
    next: Vec<f32>,
    scratch: Vec<i16>,
}

/// Outcome of one render call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    /// Output frames filled with audio
    pub produced: usize,
    /// Input frames consumed from the source
    pub consumed: u64,
}

impl StreamResampler {
    pub fn new(input_rate: u32, output_rate: u32, input_channels: u16, output_channels: u16) -> Self {
        let input_channels = input_channels.max(1);
        let mut resampler = Self {
            input_channels,
            output_channels: output_channels.max(1),
            input_rate: input_rate.max(1),
            output_rate: output_rate.max(1),
            playback_rate: 1.0,
            step: 1.0,
            frac: 1.0,
            prev: vec![0.0; input_channels as usize],
            next: vec![0.0; input_channels as usize],
            scratch: vec![0; input_channels as usize],
        };
        resampler.update_step();
        resampler
    }

    pub fn set_playback_rate(&mut self, rate: f32) {
        if rate > 0.0 && rate.is_finite() {
            self.playback_rate = rate;
            self.update_step();
        } else {
            log::warn!("[resampler] ignoring playback rate {}", rate);
        }
    }

    pub fn playback_rate(&self) -> f32 {
        self.playback_rate
    }

    fn update_step(&mut self) {
        self.step = self.input_rate as f64 * self.playback_rate as f64 / self.output_rate as f64;
    }

    /// Forget interpolation history, e.g. after the source was flushed
    pub fn reset(&mut self) {
        self.frac = 1.0;
        self.prev.fill(0.0);
        self.next.fill(0.0);
    }

    /// Fill `output` (interleaved, `output_channels` wide) from frames supplied by `pull`.
    ///
    /// `pull` fills one interleaved input frame and returns false when none is
    /// available; the rest of `output` is then zero-filled.
    pub fn render<F>(&mut self, output: &mut [f32], mut pull: F) -> RenderStats
    where
        F: FnMut(&mut [i16]) -> bool,
    {
        let out_channels = self.output_channels as usize;
        let mut stats = RenderStats::default();

        let total_frames = output.len() / out_channels;

        for frame_idx in 0..total_frames {
            while self.frac >= 1.0 {
                if !pull(&mut self.scratch) {
                    output[frame_idx * out_channels..].fill(0.0);
                    return stats;
                }
                std::mem::swap(&mut self.prev, &mut self.next);
                for (dst, &src) in self.next.iter_mut().zip(self.scratch.iter()) {
                    *dst = src as f32 / 32768.0;
                }
                self.frac -= 1.0;
                stats.consumed += 1;
            }

            let t = self.frac as f32;
            let frame = &mut output[frame_idx * out_channels..(frame_idx + 1) * out_channels];
            for (ch, sample) in frame.iter_mut().enumerate() {
                let a = map_channel(&self.prev, self.input_channels, self.output_channels, ch);
                let b = map_channel(&self.next, self.input_channels, self.output_channels, ch);
                *sample = a + (b - a) * t;
            }
            self.frac += self.step;
            stats.produced += 1;
        }

        stats
    }
}

/// Map an input frame onto output channel `ch`
fn map_channel(frame: &[f32], input_channels: u16, output_channels: u16, ch: usize) -> f32 {
    match (input_channels, output_channels) {
        // Stereo to mono: average L and R
        (2, 1) => (frame[0] + frame[1]) * 0.5,
        // Mono to stereo (or wider): duplicate
        (1, _) => frame[0],
        (input, _) => frame[ch % input as usize],
    }
}

/// Check if any conversion is needed
pub fn needs_resampling(input_rate: u32, output_rate: u32, input_channels: u16, output_channels: u16) -> bool {
    input_rate != output_rate || input_channels != output_channels
}

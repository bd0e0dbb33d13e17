// Sample identity, transport state and result conventions

/// Sample identifier, unique within one pool instance
pub type SampleId = i32;

/// Sentinel id returned across the C boundary for rejected requests
pub const INVALID_SAMPLE_ID: SampleId = -1;

/// Play count used for `repeat == -1` (loop forever)
pub const INFINITE_PLAYS: u32 = u32::MAX;

/// Transport state of a sample
///
/// Closed is tracked separately by the sample, a sample can be closed
/// from any of these states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Created, initial decode not finished
    Uninitialized,
    /// Loaded and idle; next play starts from the beginning
    Stopped,
    /// Playback suspended, resumable
    Paused,
    /// Playback loop active
    Playing,
}

impl TransportState {
    pub fn is_loaded(self) -> bool {
        self != TransportState::Uninitialized
    }
}

/// Outcome of a live parameter setter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetResult {
    Success,
    /// Parameter outside the accepted range
    InvalidValue,
    /// No sample loaded, or the sample is closed
    InvalidOperation,
}

/// Convert a caller loop argument into a total play count.
///
/// `0` plays once, `n > 0` plays `n + 1` times, `-1` loops forever.
/// Anything below `-1` is rejected.
pub fn play_count_for_repeat(repeat: i32) -> Option<u32> {
    match repeat {
        -1 => Some(INFINITE_PLAYS),
        r if r >= 0 => Some((r as u32).saturating_add(1)),
        _ => None,
    }
}

/// Slowest accepted playback rate
pub const MIN_PLAYBACK_RATE: f32 = 0.5;

/// Fastest accepted playback rate
pub const MAX_PLAYBACK_RATE: f32 = 2.0;

/// Channel gain must lie in `0.0..=1.0`
pub fn is_valid_volume(volume: f32) -> bool {
    (0.0..=1.0).contains(&volume)
}

pub fn is_valid_rate(rate: f32) -> bool {
    (MIN_PLAYBACK_RATE..=MAX_PLAYBACK_RATE).contains(&rate)
}

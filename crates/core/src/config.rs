// Pool configuration

use crate::error::{AudioError, Result};
use std::time::Duration;

/// Sources at or above this size never use static buffering (140 KiB)
pub const DEFAULT_STATIC_SIZE_CEILING: u64 = 140 * 1024;

/// Sources below this size keep the minimum sink write buffer (20 KiB)
pub const DEFAULT_SMALL_FILE_SIZE: u64 = 20 * 1024;

/// Pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Hard ceiling on simultaneously loaded samples
    pub max_samples: usize,
    /// Default decoded-PCM cap in bytes before a sample switches to progressive decode
    pub default_buffer_size: usize,
    /// Worker threads kept alive while idle
    pub min_play_threads: usize,
    /// Upper bound on concurrent playback loops
    pub max_play_threads: usize,
    /// Idle time after which a non-core worker exits
    pub worker_idle_timeout: Duration,
    /// Static preference is downgraded to streaming at or above this source size
    pub static_size_ceiling: u64,
    /// Sources below this size that fully buffer use the minimum sink buffer
    pub small_file_size: u64,
    /// Static buffer is pre-sized to `source size * static_buffer_expansion`
    pub static_buffer_expansion: usize,
    /// Buffer cap used for `play_once` samples
    pub play_once_buffer_size: usize,
    /// Total time without decoder output before the session is declared failed
    pub decode_stall_limit: Duration,
    /// Wait between sink write attempts when the sink is full
    pub write_retry_interval: Duration,
}

impl PoolConfig {
    pub fn new(max_samples: usize, default_buffer_size: usize) -> Self {
        Self {
            max_samples,
            default_buffer_size,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_samples == 0 {
            return Err(AudioError::InitializationError(
                "max_samples must be greater than zero".to_string(),
            ));
        }
        if self.min_play_threads == 0 || self.min_play_threads > self.max_play_threads {
            return Err(AudioError::InitializationError(format!(
                "invalid play thread bounds: min={} max={}",
                self.min_play_threads, self.max_play_threads
            )));
        }
        if self.default_buffer_size == 0 || self.play_once_buffer_size == 0 {
            return Err(AudioError::InitializationError(
                "buffer sizes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_samples: 16,
            default_buffer_size: 100_000,
            min_play_threads: 4,
            max_play_threads: 8,
            worker_idle_timeout: Duration::from_secs(2),
            static_size_ceiling: DEFAULT_STATIC_SIZE_CEILING,
            small_file_size: DEFAULT_SMALL_FILE_SIZE,
            static_buffer_expansion: 12,
            play_once_buffer_size: 5000,
            decode_stall_limit: Duration::from_secs(2),
            write_retry_interval: Duration::from_millis(5),
        }
    }
}

// Core types and collaborator traits shared by the soundpool crates

pub mod callback;
pub mod config;
pub mod engine;
pub mod error;
pub mod sink;
pub mod state;

// Re-export commonly used types
pub use callback::{EventDispatcher, LoadCompleteListener, LoadEvent};
pub use config::PoolConfig;
pub use engine::{
    CompressedChunk, DecodeEngine, DecodeOutput, DecoderFactory, ResolvedSource, StreamFormat,
};
pub use error::{AudioError, Result};
pub use sink::{AudioSink, SinkFactory, SinkSpec, SinkState};
pub use state::{
    is_valid_rate, is_valid_volume, play_count_for_repeat, SampleId, SetResult, TransportState,
    INFINITE_PLAYS, INVALID_SAMPLE_ID, MAX_PLAYBACK_RATE, MIN_PLAYBACK_RATE,
};

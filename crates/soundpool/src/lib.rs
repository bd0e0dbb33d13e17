// Multi-sample audio pool: preloading, streaming decode and concurrent playback

mod pool;
mod sample;
mod scheduler;
mod worker;

pub use pool::SoundPool;
pub use sample::{PlaybackSample, SampleConfig};
pub use worker::WorkerPool;

pub use soundpool_core::{
    AudioError, AudioSink, CompressedChunk, DecodeEngine, DecodeOutput, DecoderFactory,
    LoadCompleteListener, LoadEvent, PoolConfig, ResolvedSource, Result, SampleId, SetResult,
    SinkFactory, SinkSpec, SinkState, StreamFormat, TransportState, INFINITE_PLAYS,
    INVALID_SAMPLE_ID, MAX_PLAYBACK_RATE, MIN_PLAYBACK_RATE,
};
pub use soundpool_source::{
    ContentProvider, DefaultResolver, ResourceEntry, ResourceId, SampleSource, SourceResolver,
    NO_RESOURCE,
};

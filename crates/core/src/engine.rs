// Decode engine abstraction layer

use crate::error::Result;
use std::fmt;
use std::time::Duration;
use symphonia::core::io::MediaSource;

/// A resolved sample source: a byte handle plus its window in the underlying file
pub struct ResolvedSource {
    /// Seekable (file) or streamable (network) byte handle, positioned at `offset`
    pub media: Box<dyn MediaSource>,
    /// Start of the sample inside the handle's backing file
    pub offset: u64,
    /// Declared size in bytes
    pub size: u64,
    /// File extension used as a format hint, if known
    pub extension: Option<String>,
}

impl ResolvedSource {
    pub fn new(media: Box<dyn MediaSource>, offset: u64, size: u64) -> Self {
        Self {
            media,
            offset,
            size,
            extension: None,
        }
    }

    pub fn with_extension(mut self, extension: Option<String>) -> Self {
        self.extension = extension;
        self
    }
}

impl fmt::Debug for ResolvedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSource")
            .field("offset", &self.offset)
            .field("size", &self.size)
            .field("extension", &self.extension)
            .field("seekable", &self.media.is_seekable())
            .finish()
    }
}

/// Negotiated output format, always 16-bit PCM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub channels: u16,
    pub sample_rate: u32,
}

impl StreamFormat {
    /// Bytes per interleaved 16-bit frame
    pub fn frame_size(&self) -> usize {
        self.channels.max(1) as usize * 2
    }
}

/// One compressed unit of input pulled from the demuxer
#[derive(Debug, Clone, PartialEq)]
pub enum CompressedChunk {
    Data {
        data: Box<[u8]>,
        timestamp: u64,
        duration: u64,
    },
    EndOfStream,
}

/// Result of asking the decoder for output
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutput {
    /// Interleaved little-endian 16-bit PCM
    Pcm(Vec<u8>),
    /// No output within the timeout, more input may be needed
    TryAgain,
    /// All input decoded
    EndOfStream,
}

/// Decode session: demuxer + codec pairing for one source
///
/// Sessions are exclusively owned by one sample and only touched under
/// that sample's lock.
pub trait DecodeEngine: Send {
    /// Open the source and negotiate channels and sample rate.
    /// Fails if the source is not a decodable audio stream.
    fn negotiate(&mut self, source: ResolvedSource) -> Result<StreamFormat>;

    /// Read the next compressed chunk from the demuxer
    fn pull_compressed(&mut self) -> Result<CompressedChunk>;

    /// Queue a compressed chunk (or end of stream) for decoding
    fn push_compressed(&mut self, chunk: CompressedChunk) -> Result<()>;

    /// Fetch decoded PCM, waiting at most `timeout`
    fn pull_decoded(&mut self, timeout: Duration) -> Result<DecodeOutput>;

    /// Rewind the demuxer and reset the codec so decoding restarts at the first frame
    fn seek_to_start(&mut self) -> Result<()>;

    /// Release codec and demuxer resources
    fn release(&mut self);
}

/// Creates decode sessions
pub trait DecoderFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn DecodeEngine>>;
}

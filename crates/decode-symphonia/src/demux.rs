// Demuxing audio formats using Symphonia

use soundpool_core::{AudioError, Result};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet, SeekMode, SeekTo, Track};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use std::time::Duration;

/// Format reader bound to the first decodable audio track
pub struct Demuxer {
    format_reader: Box<dyn FormatReader>,
    track_id: u32,
}

impl Demuxer {
    /// Probe a media source, using the extension as a hint when known
    pub fn open(media_source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<Self> {
        let mut hint = Hint::new();
        if let Some(extension) = extension {
            hint.with_extension(extension);
        }

        let stream = MediaSourceStream::new(media_source, Default::default());
        let format_reader = symphonia::default::get_probe()
            .format(&hint, stream, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| AudioError::UnsupportedFormat(format!("not a recognised audio container: {}", e)))?
            .format;

        // Only audio tracks carry a sample rate
        let track_id = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
            .map(|t| t.id)
            .ok_or_else(|| AudioError::UnsupportedFormat("no audio track".to_string()))?;

        Ok(Self {
            format_reader,
            track_id,
        })
    }

    /// Next packet of the selected track, `None` at end of stream
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            match self.format_reader.next_packet() {
                Ok(packet) if packet.track_id() == self.track_id => return Ok(Some(packet)),
                Ok(_) => continue,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(None)
                }
                Err(e) => return Err(AudioError::DecodingError(format!("demux failed: {}", e))),
            }
        }
    }

    /// Rewind to the first frame of the track
    pub fn seek_to_start(&mut self) -> Result<()> {
        self.format_reader
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: 0,
                    track_id: self.track_id,
                },
            )
            .map(|_| ())
            .map_err(|e| AudioError::DecodingError(format!("rewind failed: {}", e)))
    }

    fn track(&self) -> Result<&Track> {
        self.format_reader
            .tracks()
            .iter()
            .find(|t| t.id == self.track_id)
            .ok_or_else(|| AudioError::LoadError(format!("track {} vanished", self.track_id)))
    }

    /// Create a codec for the selected track
    pub fn make_decoder(&self) -> Result<Box<dyn Decoder>> {
        let params = &self.track()?.codec_params;
        symphonia::default::get_codecs()
            .make(params, &DecoderOptions::default())
            .map_err(|e| AudioError::UnsupportedFormat(format!("no codec for track: {}", e)))
    }

    pub fn track_info(&self) -> Result<TrackInfo> {
        let params = &self.track()?.codec_params;
        let sample_rate = params
            .sample_rate
            .filter(|rate| *rate > 0)
            .ok_or_else(|| AudioError::UnsupportedFormat("track has no sample rate".to_string()))?;

        Ok(TrackInfo {
            sample_rate,
            // Codecs that omit the layout are treated as stereo
            channels: params.channels.map_or(2, |c| c.count() as u16),
            frames: params.n_frames,
        })
    }

    pub fn track_id(&self) -> u32 {
        self.track_id
    }
}

/// Negotiated properties of the selected track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackInfo {
    pub sample_rate: u32,
    pub channels: u16,
    /// Total frames, when the container declares them
    pub frames: Option<u64>,
}

impl TrackInfo {
    pub fn duration(&self) -> Option<Duration> {
        self.frames
            .map(|n| Duration::from_millis(n.saturating_mul(1000) / self.sample_rate.max(1) as u64))
    }
}

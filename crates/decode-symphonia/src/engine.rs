// DecodeEngine implementation over a Symphonia demuxer and codec

use crate::convert::append_pcm16;
use crate::demux::Demuxer;
use soundpool_core::{
    AudioError, CompressedChunk, DecodeEngine, DecodeOutput, DecoderFactory, ResolvedSource,
    Result, StreamFormat,
};
use std::collections::VecDeque;
use std::time::Duration;
use symphonia::core::codecs::Decoder;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;

/// Creates [`SymphoniaEngine`] sessions
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoderFactory;

impl SymphoniaDecoderFactory {
    pub fn new() -> Self {
        Self
    }
}

impl DecoderFactory for SymphoniaDecoderFactory {
    fn create(&self) -> Result<Box<dyn DecodeEngine>> {
        Ok(Box::new(SymphoniaEngine::new()))
    }
}

struct QueuedPacket {
    data: Box<[u8]>,
    timestamp: u64,
    duration: u64,
}

/// One demuxer + codec pairing.
///
/// Symphonia decodes synchronously, so `pull_decoded` never waits: it
/// either decodes the oldest queued packet or reports `TryAgain`.
pub struct SymphoniaEngine {
    demuxer: Option<Demuxer>,
    decoder: Option<Box<dyn Decoder>>,
    queued: VecDeque<QueuedPacket>,
    input_done: bool,
    skipped_packets: u64,
}

impl SymphoniaEngine {
    pub fn new() -> Self {
        Self {
            demuxer: None,
            decoder: None,
            queued: VecDeque::new(),
            input_done: false,
            skipped_packets: 0,
        }
    }

    /// Corrupt packets dropped since negotiation
    pub fn skipped_packets(&self) -> u64 {
        self.skipped_packets
    }

    fn demuxer_mut(&mut self) -> Result<&mut Demuxer> {
        self.demuxer
            .as_mut()
            .ok_or_else(|| AudioError::InvalidState("decode session not negotiated".to_string()))
    }
}

impl Default for SymphoniaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeEngine for SymphoniaEngine {
    fn negotiate(&mut self, source: ResolvedSource) -> Result<StreamFormat> {
        let demuxer = Demuxer::open(source.media, source.extension.as_deref())?;
        let info = demuxer.track_info()?;
        let decoder = demuxer.make_decoder()?;

        log::debug!(
            "[decode] negotiated {} Hz, {} ch, duration {:?}",
            info.sample_rate,
            info.channels,
            info.duration()
        );

        self.demuxer = Some(demuxer);
        self.decoder = Some(decoder);
        self.queued.clear();
        self.input_done = false;
        self.skipped_packets = 0;

        Ok(StreamFormat {
            channels: info.channels,
            sample_rate: info.sample_rate,
        })
    }

    fn pull_compressed(&mut self) -> Result<CompressedChunk> {
        let packet = self.demuxer_mut()?.next_packet()?;
        Ok(match packet {
            Some(packet) => CompressedChunk::Data {
                timestamp: packet.ts(),
                duration: packet.dur(),
                data: packet.data,
            },
            None => CompressedChunk::EndOfStream,
        })
    }

    fn push_compressed(&mut self, chunk: CompressedChunk) -> Result<()> {
        match chunk {
            CompressedChunk::Data {
                data,
                timestamp,
                duration,
            } => self.queued.push_back(QueuedPacket {
                data,
                timestamp,
                duration,
            }),
            CompressedChunk::EndOfStream => self.input_done = true,
        }
        Ok(())
    }

    fn pull_decoded(&mut self, _timeout: Duration) -> Result<DecodeOutput> {
        let track_id = self.demuxer_mut()?.track_id();

        let Some(queued) = self.queued.pop_front() else {
            return Ok(if self.input_done {
                DecodeOutput::EndOfStream
            } else {
                DecodeOutput::TryAgain
            });
        };

        let decoder = self
            .decoder
            .as_mut()
            .ok_or_else(|| AudioError::InvalidState("decode session not negotiated".to_string()))?;

        let packet =
            Packet::new_from_boxed_slice(track_id, queued.timestamp, queued.duration, queued.data);
        match decoder.decode(&packet) {
            Ok(decoded) => {
                let mut pcm = Vec::new();
                append_pcm16(&decoded, &mut pcm);
                if pcm.is_empty() {
                    Ok(DecodeOutput::TryAgain)
                } else {
                    Ok(DecodeOutput::Pcm(pcm))
                }
            }
            Err(SymphoniaError::DecodeError(msg)) => {
                self.skipped_packets += 1;
                log::warn!("[decode] skipping corrupt packet at ts {}: {}", queued.timestamp, msg);
                Ok(DecodeOutput::TryAgain)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn seek_to_start(&mut self) -> Result<()> {
        self.demuxer_mut()?.seek_to_start()?;
        if let Some(decoder) = self.decoder.as_mut() {
            decoder.reset();
        }
        self.queued.clear();
        self.input_done = false;
        Ok(())
    }

    fn release(&mut self) {
        self.queued.clear();
        self.decoder = None;
        self.demuxer = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Minimal 16-bit PCM WAV file
    fn wav_bytes(channels: u16, sample_rate: u32, frames: u32) -> Vec<u8> {
        let block_align = channels as u32 * 2;
        let data_len = frames * block_align;
        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * block_align).to_le_bytes());
        out.extend_from_slice(&(block_align as u16).to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for i in 0..frames * channels as u32 {
            out.extend_from_slice(&((i % 1000) as i16).to_le_bytes());
        }
        out
    }

    fn resolved(bytes: Vec<u8>) -> ResolvedSource {
        let size = bytes.len() as u64;
        ResolvedSource::new(Box::new(Cursor::new(bytes)), 0, size).with_extension(Some("wav".to_string()))
    }

    fn decode_all(engine: &mut SymphoniaEngine) -> Vec<u8> {
        let mut pcm = Vec::new();
        loop {
            let chunk = engine.pull_compressed().unwrap();
            engine.push_compressed(chunk).unwrap();
            match engine.pull_decoded(Duration::from_millis(1)).unwrap() {
                DecodeOutput::Pcm(bytes) => pcm.extend_from_slice(&bytes),
                DecodeOutput::TryAgain => {}
                DecodeOutput::EndOfStream => break,
            }
        }
        pcm
    }

    #[test]
    fn test_negotiate_reports_format() {
        let mut engine = SymphoniaEngine::new();
        let format = engine.negotiate(resolved(wav_bytes(2, 22_050, 1000))).unwrap();
        assert_eq!(format.channels, 2);
        assert_eq!(format.sample_rate, 22_050);
        assert_eq!(format.frame_size(), 4);
    }

    #[test]
    fn test_decodes_every_frame() {
        let mut engine = SymphoniaEngine::new();
        engine.negotiate(resolved(wav_bytes(1, 8_000, 3000))).unwrap();

        let pcm = decode_all(&mut engine);
        assert_eq!(pcm.len(), 3000 * 2);
        assert_eq!(i16::from_le_bytes([pcm[2], pcm[3]]), 1);
    }

    #[test]
    fn test_seek_to_start_replays_stream() {
        let mut engine = SymphoniaEngine::new();
        engine.negotiate(resolved(wav_bytes(1, 8_000, 2000))).unwrap();

        let first = decode_all(&mut engine);
        engine.seek_to_start().unwrap();
        let second = decode_all(&mut engine);
        assert_eq!(first, second);
    }

    #[test]
    fn test_garbage_fails_negotiation() {
        let mut engine = SymphoniaEngine::new();
        let garbage = ResolvedSource::new(Box::new(Cursor::new(vec![0x5au8; 4096])), 0, 4096);
        assert!(engine.negotiate(garbage).is_err());
    }

    #[test]
    fn test_operations_before_negotiate_fail() {
        let mut engine = SymphoniaEngine::new();
        assert!(matches!(engine.pull_compressed(), Err(AudioError::InvalidState(_))));
        assert!(engine.seek_to_start().is_err());
    }
}

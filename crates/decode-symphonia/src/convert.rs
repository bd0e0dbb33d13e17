// Conversion of decoded Symphonia buffers to interleaved 16-bit little-endian PCM

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::conv::IntoSample;
use symphonia::core::sample::Sample;

/// Append the buffer's frames to `out` as interleaved i16 LE
pub fn append_pcm16(buffer: &AudioBufferRef, out: &mut Vec<u8>) {
    match buffer {
        AudioBufferRef::U8(buf) => interleave(buf, out),
        AudioBufferRef::U16(buf) => interleave(buf, out),
        AudioBufferRef::U24(buf) => interleave(buf, out),
        AudioBufferRef::U32(buf) => interleave(buf, out),
        AudioBufferRef::S8(buf) => interleave(buf, out),
        AudioBufferRef::S16(buf) => interleave(buf, out),
        AudioBufferRef::S24(buf) => interleave(buf, out),
        AudioBufferRef::S32(buf) => interleave(buf, out),
        AudioBufferRef::F32(buf) => interleave(buf, out),
        AudioBufferRef::F64(buf) => interleave(buf, out),
    }
}

fn interleave<S>(buf: &AudioBuffer<S>, out: &mut Vec<u8>)
where
    S: Sample + IntoSample<i16>,
{
    let num_channels = buf.spec().channels.count();
    let num_frames = buf.frames();
    out.reserve(num_frames * num_channels * 2);

    for frame_idx in 0..num_frames {
        for ch_idx in 0..num_channels {
            let sample: i16 = buf.chan(ch_idx)[frame_idx].into_sample();
            out.extend_from_slice(&sample.to_le_bytes());
        }
    }
}

// Decode engine backed by Symphonia

mod convert;
mod demux;
mod engine;

pub use demux::{Demuxer, TrackInfo};
pub use engine::{SymphoniaDecoderFactory, SymphoniaEngine};

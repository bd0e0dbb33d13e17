// cpal-based audio sink

mod pipeline;
mod sink;

pub use pipeline::{OutputPipeline, SinkShared};
pub use sink::{CpalSink, CpalSinkFactory};

// Sample source descriptors and resolution into byte handles

pub mod descriptor;
pub mod resolver;
pub mod window;

pub use descriptor::{ResourceId, SampleSource, NO_RESOURCE};
pub use resolver::{ContentProvider, DefaultResolver, ResourceEntry, ResourceTable, SourceResolver};
pub use window::OffsetSource;

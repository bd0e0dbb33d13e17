// Caller-facing description of where a sample comes from

use soundpool_core::ResolvedSource;
use soundpool_transport_http::is_http_url;
use std::fmt;
use std::path::Path;

/// Identifier of a bundled resource
pub type ResourceId = u32;

/// Reserved "no resource" identifier
pub const NO_RESOURCE: ResourceId = 0;

/// Where a sample's bytes live
pub enum SampleSource {
    /// Bundled resource looked up in the resolver's resource table
    Resource(ResourceId),
    /// Local filesystem path
    Path(String),
    /// `content://` URI served by a registered content provider
    ContentUri(String),
    /// HTTP(S) URL
    Url(String),
    /// Already opened by the caller
    Opened(ResolvedSource),
}

impl SampleSource {
    /// Classify a path-like string
    pub fn from_path(path: &str) -> Self {
        let trimmed = path.trim();
        if is_http_url(trimmed) {
            SampleSource::Url(trimmed.to_string())
        } else if trimmed.starts_with("content://") {
            SampleSource::ContentUri(trimmed.to_string())
        } else if let Some(local) = trimmed.strip_prefix("file://") {
            SampleSource::Path(local.to_string())
        } else {
            SampleSource::Path(trimmed.to_string())
        }
    }

    /// True for descriptors that must be rejected before any resolution attempt
    pub fn is_empty(&self) -> bool {
        match self {
            SampleSource::Resource(id) => *id == NO_RESOURCE,
            SampleSource::Path(p) | SampleSource::ContentUri(p) | SampleSource::Url(p) => p.is_empty(),
            SampleSource::Opened(_) => false,
        }
    }

    /// File extension usable as a format hint
    pub fn extension(&self) -> Option<String> {
        let path = match self {
            SampleSource::Path(p) => p.as_str(),
            SampleSource::Url(u) => u.split(['?', '#']).next().unwrap_or(u),
            SampleSource::Opened(resolved) => return resolved.extension.clone(),
            _ => return None,
        };
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

impl From<&str> for SampleSource {
    fn from(path: &str) -> Self {
        SampleSource::from_path(path)
    }
}

impl From<String> for SampleSource {
    fn from(path: String) -> Self {
        SampleSource::from_path(&path)
    }
}

impl From<ResourceId> for SampleSource {
    fn from(id: ResourceId) -> Self {
        SampleSource::Resource(id)
    }
}

impl fmt::Debug for SampleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleSource::Resource(id) => write!(f, "Resource({})", id),
            SampleSource::Path(p) => write!(f, "Path({})", p),
            SampleSource::ContentUri(u) => write!(f, "ContentUri({})", u),
            SampleSource::Url(u) => write!(f, "Url({})", u),
            SampleSource::Opened(r) => write!(f, "Opened({:?})", r),
        }
    }
}

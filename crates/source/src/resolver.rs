// Resolution of sample descriptors into seekable or streamable byte handles

use crate::descriptor::{ResourceId, SampleSource, NO_RESOURCE};
use crate::window::OffsetSource;
use parking_lot::RwLock;
use soundpool_core::{AudioError, ResolvedSource, Result};
use soundpool_transport_http::HttpRangeSource;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Size assumed for network sources whose length cannot be probed
pub const UNKNOWN_SIZE_FALLBACK: u64 = 8192;

/// Turns a descriptor into a byte handle plus its declared size
pub trait SourceResolver: Send + Sync {
    fn resolve(&self, source: SampleSource) -> Result<ResolvedSource>;
}

/// Serves `content://` URIs
pub trait ContentProvider: Send + Sync {
    fn open(&self, uri: &str) -> Result<ResolvedSource>;
}

/// Location of a bundled resource inside a (possibly packed) file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    pub path: PathBuf,
    pub offset: u64,
    /// `None` means "to the end of the file"
    pub length: Option<u64>,
}

impl ResourceEntry {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            length: None,
        }
    }

    pub fn packed(path: impl Into<PathBuf>, offset: u64, length: u64) -> Self {
        Self {
            path: path.into(),
            offset,
            length: Some(length),
        }
    }
}

/// Registry of bundled resources
#[derive(Default)]
pub struct ResourceTable {
    entries: RwLock<HashMap<ResourceId, ResourceEntry>>,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: ResourceId, entry: ResourceEntry) -> Result<()> {
        if id == NO_RESOURCE {
            return Err(AudioError::InvalidState("resource id 0 is reserved".to_string()));
        }
        if let Some(previous) = self.entries.write().insert(id, entry) {
            log::debug!("[resolver] resource {} replaced (was {:?})", id, previous.path);
        }
        Ok(())
    }

    pub fn remove(&self, id: ResourceId) -> Option<ResourceEntry> {
        self.entries.write().remove(&id)
    }

    pub fn get(&self, id: ResourceId) -> Option<ResourceEntry> {
        self.entries.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// File, resource, content-provider and HTTP resolution
#[derive(Default)]
pub struct DefaultResolver {
    resources: ResourceTable,
    content: RwLock<Option<Arc<dyn ContentProvider>>>,
}

impl DefaultResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    pub fn set_content_provider(&self, provider: Option<Arc<dyn ContentProvider>>) {
        *self.content.write() = provider;
    }

    fn open_file(path: &Path, extension: Option<String>) -> Result<ResolvedSource> {
        let file = File::open(path)
            .map_err(|e| AudioError::IoError(format!("{}: {}", path.display(), e)))?;
        let size = file.metadata()?.len();
        log::debug!("[resolver] file {} ({} bytes)", path.display(), size);
        Ok(ResolvedSource::new(Box::new(file), 0, size).with_extension(extension))
    }

    fn open_resource(&self, id: ResourceId) -> Result<ResolvedSource> {
        let entry = self
            .resources
            .get(id)
            .ok_or_else(|| AudioError::IoError(format!("unknown resource {}", id)))?;

        let file = File::open(&entry.path)
            .map_err(|e| AudioError::IoError(format!("resource {}: {}", id, e)))?;
        let file_len = file.metadata()?.len();
        if entry.offset > file_len {
            return Err(AudioError::IoError(format!(
                "resource {} offset {} beyond file end {}",
                id, entry.offset, file_len
            )));
        }
        let length = entry
            .length
            .unwrap_or(file_len - entry.offset)
            .min(file_len - entry.offset);

        let extension = entry
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let window = OffsetSource::new(file, entry.offset, length)?;
        log::debug!(
            "[resolver] resource {} -> {} [{}+{}]",
            id,
            entry.path.display(),
            entry.offset,
            length
        );
        Ok(ResolvedSource::new(Box::new(window), entry.offset, length).with_extension(extension))
    }

    fn open_url(url: &str, extension: Option<String>) -> Result<ResolvedSource> {
        let source = HttpRangeSource::open(url)?;
        let size = match source.total_size() {
            Some(size) => size,
            None => {
                log::warn!(
                    "[resolver] size of {} unknown, assuming {} bytes",
                    url,
                    UNKNOWN_SIZE_FALLBACK
                );
                UNKNOWN_SIZE_FALLBACK
            }
        };
        Ok(ResolvedSource::new(Box::new(source), 0, size).with_extension(extension))
    }
}

impl SourceResolver for DefaultResolver {
    fn resolve(&self, source: SampleSource) -> Result<ResolvedSource> {
        if source.is_empty() {
            return Err(AudioError::IoError(format!("empty source {:?}", source)));
        }
        let extension = source.extension();

        match source {
            SampleSource::Resource(id) => self.open_resource(id),
            SampleSource::Path(path) => Self::open_file(Path::new(&path), extension),
            SampleSource::ContentUri(uri) => {
                let provider = self.content.read().clone();
                match provider {
                    Some(provider) => provider.open(&uri),
                    None => Err(AudioError::IoError(format!(
                        "no content provider for {}",
                        uri
                    ))),
                }
            }
            SampleSource::Url(url) => Self::open_url(&url, extension),
            SampleSource::Opened(resolved) => Ok(resolved),
        }
    }
}

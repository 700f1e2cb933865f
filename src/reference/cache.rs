use crate::env;
use crate::reference::documentation::{DocumentationProvider, DocumentationProviderRegistry};
use crate::reference::types::*;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Process-wide cache from normalized location to resolved reference.
///
/// Each key owns a cell that is initialized at most once. Concurrent first
/// resolutions of one key await the same initialization, so every caller
/// observes the same [`ReferenceEntry`]. A failed resolution leaves the cell
/// empty and does not affect other keys.
pub struct MetadataReferenceCache {
    entries: DashMap<ReferenceKey, Arc<OnceCell<ReferenceEntry>>>,
    search_directories: Vec<PathBuf>,
    documentation: Arc<DocumentationProviderRegistry>,
}

impl MetadataReferenceCache {
    /// Create a cache resolving bare assembly names against `search_directories`
    pub fn new(
        search_directories: Vec<PathBuf>,
        documentation: Arc<DocumentationProviderRegistry>,
    ) -> Self {
        info!(
            "Metadata reference cache searching {} directories",
            search_directories.len()
        );
        Self {
            entries: DashMap::new(),
            search_directories,
            documentation,
        }
    }

    /// Resolve a location to a cached reference entry
    pub async fn resolve(&self, location: &str) -> Result<ReferenceEntry, ReferenceError> {
        let key = ReferenceKey::normalize(location)?;
        let cell = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        match cell.get_or_try_init(|| self.load(location, &key)).await {
            Ok(entry) => Ok(entry.clone()),
            Err(e) => {
                // Drop the empty cell unless another caller is still waiting on it
                self.entries.remove_if(&key, |_, existing| {
                    Arc::ptr_eq(existing, &cell)
                        && !existing.initialized()
                        && Arc::strong_count(existing) == 2
                });
                Err(e)
            }
        }
    }

    /// Look up an already resolved entry without touching the file system
    pub fn get(&self, location: &str) -> Option<ReferenceEntry> {
        let key = ReferenceKey::normalize(location).ok()?;
        self.entries.get(&key)?.value().get().cloned()
    }

    /// Documentation provider for an assembly path, shared with resolved entries
    pub async fn documentation_provider(&self, assembly_path: &Path) -> Arc<DocumentationProvider> {
        self.documentation.provider_for(assembly_path).await
    }

    /// Number of successfully resolved entries
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys holding a cell, resolved or still resolving
    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }

    async fn load(&self, location: &str, key: &ReferenceKey) -> Result<ReferenceEntry, ReferenceError> {
        debug!("Resolving metadata reference {} (key {})", location, key);

        let path = self.locate(location).await?;
        let documentation = self.documentation.provider_for(&path).await;
        let reference = Arc::new(MetadataReference::new(path));

        debug!(
            "Resolved {} to {} (documentation: {})",
            location,
            reference.path.display(),
            !documentation.is_empty()
        );
        Ok(ReferenceEntry {
            reference,
            documentation,
        })
    }

    async fn locate(&self, location: &str) -> Result<PathBuf, ReferenceError> {
        let location = location.trim();

        if is_bare_name(location) {
            let file_name = format!(
                "{}.{}",
                strip_assembly_suffixes(location),
                env::reference::ASSEMBLY_EXTENSION
            );
            for dir in &self.search_directories {
                let candidate = dir.join(&file_name);
                if is_module_file(&candidate).await {
                    return Ok(candidate);
                }
            }
            warn!("Assembly {} not found in search directories", location);
            return Err(ReferenceError::NotFound {
                location: location.to_string(),
            });
        }

        let path = absolute_path(Path::new(location)).map_err(|source| ReferenceError::Io {
            path: PathBuf::from(location),
            source,
        })?;
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(path),
            Ok(_) => Err(ReferenceError::NotAFile { path }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ReferenceError::NotFound {
                location: location.to_string(),
            }),
            Err(source) => Err(ReferenceError::Io { path, source }),
        }
    }
}

async fn is_module_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

use crate::env;
use crate::reference::types::{DiscoveredPaths, absolute_path};
use dashmap::DashMap;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// `<member name="...">...</member>` blocks of a documentation file
static MEMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<member\s+name="([^"]+)"\s*>(.*?)</member>"#).unwrap()
});

static SUMMARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<summary>(.*?)</summary>").unwrap());

/// Per-assembly documentation, loaded on first lookup.
///
/// A provider without a source file is the empty provider: every lookup
/// returns `None`. Documentation is never required for compilation.
#[derive(Debug)]
pub struct DocumentationProvider {
    source: Option<PathBuf>,
    members: OnceCell<HashMap<String, String>>,
}

impl DocumentationProvider {
    pub fn empty() -> Self {
        Self {
            source: None,
            members: OnceCell::new(),
        }
    }

    pub fn from_file(path: PathBuf) -> Self {
        Self {
            source: Some(path),
            members: OnceCell::new(),
        }
    }

    /// Documentation file backing this provider
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_none()
    }

    /// Whether the documentation file has been read yet
    pub fn is_loaded(&self) -> bool {
        self.members.initialized()
    }

    /// Summary text for a documentation member id such as `T:System.Object`
    pub async fn documentation_for(&self, member_id: &str) -> Option<String> {
        self.members().await.get(member_id).cloned()
    }

    pub async fn member_count(&self) -> usize {
        self.members().await.len()
    }

    async fn members(&self) -> &HashMap<String, String> {
        self.members.get_or_init(|| self.load()).await
    }

    async fn load(&self) -> HashMap<String, String> {
        let Some(path) = &self.source else {
            return HashMap::new();
        };

        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                let members = parse_documentation(&content);
                debug!(
                    "Loaded {} documented members from {}",
                    members.len(),
                    path.display()
                );
                members
            }
            Err(e) => {
                warn!("Failed to read documentation file {}: {}", path.display(), e);
                HashMap::new()
            }
        }
    }
}

/// Extract member summaries, collapsing whitespace.
pub(crate) fn parse_documentation(content: &str) -> HashMap<String, String> {
    MEMBER_RE
        .captures_iter(content)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str();
            let body = caps.get(2)?.as_str();
            let summary = SUMMARY_RE.captures(body)?.get(1)?.as_str();
            let text = summary.split_whitespace().collect::<Vec<_>>().join(" ");
            Some((name.to_string(), text))
        })
        .collect()
}

/// Lazily constructed documentation providers keyed by documentation path.
pub struct DocumentationProviderRegistry {
    paths: DiscoveredPaths,
    providers: DashMap<PathBuf, Arc<DocumentationProvider>>,
    empty: Arc<DocumentationProvider>,
}

impl DocumentationProviderRegistry {
    pub fn new(paths: DiscoveredPaths) -> Self {
        Self {
            paths,
            providers: DashMap::new(),
            empty: Arc::new(DocumentationProvider::empty()),
        }
    }

    /// Absolute assembly path with its extension replaced by the
    /// documentation extension.
    pub fn documentation_key(assembly_path: &Path) -> PathBuf {
        absolute_path(assembly_path)
            .unwrap_or_else(|_| assembly_path.to_path_buf())
            .with_extension(env::reference::DOCUMENTATION_EXTENSION)
    }

    /// Get the provider for an assembly, constructing it on first access.
    ///
    /// Lookup order: sibling documentation file, the reference documentation
    /// directory, then the reference-assemblies root. Concurrent first
    /// accesses may both probe the file system, but only the first inserted
    /// provider is kept and returned to every caller.
    pub async fn provider_for(&self, assembly_path: &Path) -> Arc<DocumentationProvider> {
        let key = Self::documentation_key(assembly_path);
        if let Some(existing) = self.providers.get(&key) {
            return existing.value().clone();
        }

        let provider = match self.locate(&key).await {
            Some(file) => {
                debug!("Documentation for {} found at {}", assembly_path.display(), file.display());
                Arc::new(DocumentationProvider::from_file(file))
            }
            None => {
                debug!("No documentation for {}", assembly_path.display());
                self.empty.clone()
            }
        };

        self.providers.entry(key).or_insert(provider).value().clone()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    async fn locate(&self, key: &Path) -> Option<PathBuf> {
        let file_name = key.file_name()?;
        let mut candidates = vec![key.to_path_buf()];
        if let Some(dir) = &self.paths.documentation {
            candidates.push(dir.join(file_name));
        }
        if let Some(dir) = &self.paths.reference_assemblies {
            candidates.push(dir.join(file_name));
        }

        for candidate in candidates {
            if let Ok(metadata) = tokio::fs::metadata(&candidate).await
                && metadata.is_file()
            {
                return Some(candidate);
            }
        }
        None
    }
}

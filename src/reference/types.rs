use crate::env;
use crate::reference::documentation::DocumentationProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// File extensions recognized as loadable modules.
const ASSEMBLY_EXTENSIONS: &[&str] = &["dll", "exe", "winmd"];

/// A resolved, loadable handle to a compiled library on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataReference {
    /// Simple name (file stem without extension or platform suffix)
    pub name: String,
    /// Absolute location of the module
    pub path: PathBuf,
}

impl MetadataReference {
    pub fn new(path: PathBuf) -> Self {
        let name = simple_name(&path);
        Self { name, path }
    }

    /// Case-insensitive simple-name comparison, as assembly names are matched
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(strip_assembly_suffixes(name))
    }
}

/// A resolved reference together with its documentation provider.
///
/// Cloning is cheap and preserves identity: every clone of the entry cached
/// under one key points at the same reference and provider allocations.
#[derive(Debug, Clone)]
pub struct ReferenceEntry {
    pub reference: Arc<MetadataReference>,
    pub documentation: Arc<DocumentationProvider>,
}

impl ReferenceEntry {
    pub fn name(&self) -> &str {
        &self.reference.name
    }

    pub fn path(&self) -> &Path {
        &self.reference.path
    }

    /// True when both entries share the same underlying allocations
    pub fn same_as(&self, other: &ReferenceEntry) -> bool {
        Arc::ptr_eq(&self.reference, &other.reference)
            && Arc::ptr_eq(&self.documentation, &other.documentation)
    }
}

/// Normalized cache key of a reference location.
///
/// Paths are made absolute; bare assembly names stay bare. In both cases a
/// known module extension and the platform suffix are stripped, so
/// `System.Linq.dll` and `System.Linq` share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReferenceKey(String);

impl ReferenceKey {
    pub fn normalize(location: &str) -> Result<Self, ReferenceError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(ReferenceError::NotFound {
                location: location.to_string(),
            });
        }

        if is_bare_name(location) {
            return Ok(Self(strip_assembly_suffixes(location).to_string()));
        }

        let absolute = absolute_path(Path::new(location)).map_err(|source| ReferenceError::Io {
            path: PathBuf::from(location),
            source,
        })?;
        let file_name = absolute
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = strip_assembly_suffixes(&file_name);
        let normalized = match absolute.parent() {
            Some(parent) => parent.join(stem),
            None => PathBuf::from(stem),
        };
        Ok(Self(normalized.to_string_lossy().into_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised while resolving a reference location
#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("Reference not found: {location}")]
    NotFound { location: String },
    #[error("Reference is not a loadable module: {}", path.display())]
    NotAFile { path: PathBuf },
    #[error("I/O error resolving {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Directories supplied by the platform path-discovery collaborator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredPaths {
    /// Root of the platform reference assemblies (holds the `Facades` directory)
    pub reference_assemblies: Option<PathBuf>,
    /// Directory holding reference documentation files
    pub documentation: Option<PathBuf>,
}

/// Platform-specific discovery of reference and documentation directories.
///
/// Resolved once at host construction.
pub trait PathDiscovery: Send + Sync {
    fn discover(&self) -> DiscoveredPaths;
}

/// Path discovery backed by fixed, already-known directories
#[derive(Debug, Clone, Default)]
pub struct ConfiguredPaths {
    paths: DiscoveredPaths,
}

impl ConfiguredPaths {
    pub fn new(reference_assemblies: Option<PathBuf>, documentation: Option<PathBuf>) -> Self {
        Self {
            paths: DiscoveredPaths {
                reference_assemblies,
                documentation,
            },
        }
    }
}

impl PathDiscovery for ConfiguredPaths {
    fn discover(&self) -> DiscoveredPaths {
        self.paths.clone()
    }
}

/// Absolute form of `path` with `.` and `..` collapsed lexically, so every
/// spelling of one location yields the same key.
pub(crate) fn absolute_path(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut collapsed = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                collapsed.pop();
            }
            other => collapsed.push(other.as_os_str()),
        }
    }
    Ok(collapsed)
}

/// A location without any path separator names an assembly, not a file.
pub(crate) fn is_bare_name(location: &str) -> bool {
    !location.contains('/') && !location.contains('\\')
}

/// Whether the name ends in a known module extension.
pub(crate) fn has_assembly_extension(name: &str) -> bool {
    name.rsplit_once('.').is_some_and(|(_, ext)| {
        ASSEMBLY_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
    })
}

/// Strip a known module extension, then the platform suffix.
pub(crate) fn strip_assembly_suffixes(name: &str) -> &str {
    let without_ext = match name.rsplit_once('.') {
        Some((stem, ext))
            if ASSEMBLY_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext)) =>
        {
            stem
        }
        _ => name,
    };
    without_ext
        .strip_suffix(env::reference::PLATFORM_SUFFIX)
        .unwrap_or(without_ext)
}

/// Simple assembly name of a module path
pub fn simple_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    strip_assembly_suffixes(&file_name).to_string()
}

//! Session-scoped resolvers for reference and load directives.
//!
//! Each session gets its own resolvers rooted at its working directory. The
//! reference resolver is produced by a [`ResolverFactory`] injected at host
//! construction, which is where a package-aware resolver plugs in.

use crate::reference::ReferenceError;
use crate::reference::types::{has_assembly_extension, is_bare_name};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Maps a reference directive argument to a location the metadata reference
/// cache can resolve.
#[async_trait]
pub trait MetadataReferenceResolver: Send + Sync {
    async fn resolve_directive(&self, reference: &str) -> Result<String, ReferenceError>;
}

/// Builds the reference resolver for a session working directory
pub type ResolverFactory = Arc<dyn Fn(&Path) -> Arc<dyn MetadataReferenceResolver> + Send + Sync>;

/// Resolves relative file references against a working directory and passes
/// bare assembly names through unchanged.
#[derive(Debug, Clone)]
pub struct WorkingDirectoryResolver {
    base_directory: PathBuf,
}

impl WorkingDirectoryResolver {
    pub fn new(base_directory: PathBuf) -> Self {
        Self { base_directory }
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }
}

#[async_trait]
impl MetadataReferenceResolver for WorkingDirectoryResolver {
    async fn resolve_directive(&self, reference: &str) -> Result<String, ReferenceError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ReferenceError::NotFound {
                location: reference.to_string(),
            });
        }

        // `System.Data` names an assembly, `lib.dll` or `bin/lib.dll` a file
        if is_bare_name(reference) && !has_assembly_extension(reference) {
            return Ok(reference.to_string());
        }

        let path = Path::new(reference);
        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_directory.join(path)
        };
        Ok(resolved.to_string_lossy().into_owned())
    }
}

/// Factory producing a [`WorkingDirectoryResolver`] per session
pub fn working_directory_resolver_factory() -> ResolverFactory {
    Arc::new(|dir: &Path| -> Arc<dyn MetadataReferenceResolver> {
        Arc::new(WorkingDirectoryResolver::new(dir.to_path_buf()))
    })
}

/// Resolves `#load` targets relative to a working directory
#[derive(Debug, Clone)]
pub struct SourceFileResolver {
    base_directory: PathBuf,
}

impl SourceFileResolver {
    pub fn new(base_directory: PathBuf) -> Self {
        Self { base_directory }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path.trim());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_directory.join(path)
        }
    }
}

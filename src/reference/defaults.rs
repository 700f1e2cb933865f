use crate::env::{self, WellKnownType};
use crate::reference::cache::MetadataReferenceCache;
use crate::reference::types::*;
use indexmap::{IndexMap, IndexSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// References and imports every new session starts from.
///
/// Built once at host construction and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct DefaultReferenceSet {
    references: IndexMap<String, ReferenceEntry>,
    imports: IndexSet<String>,
    facades: IndexSet<String>,
}

impl DefaultReferenceSet {
    pub fn references(&self) -> impl Iterator<Item = &ReferenceEntry> {
        self.references.values()
    }

    pub fn imports(&self) -> &IndexSet<String> {
        &self.imports
    }

    /// Look up a reference by simple assembly name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&ReferenceEntry> {
        self.references.get(&name_key(name))
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.references.contains_key(&name_key(name))
    }

    /// Whether the named entry was contributed by a platform facade
    pub fn is_facade(&self, name: &str) -> bool {
        self.facades.contains(&name_key(name))
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}

fn name_key(name: &str) -> String {
    strip_assembly_suffixes(name).to_ascii_lowercase()
}

/// Computes the [`DefaultReferenceSet`] from well-known types, caller extras
/// and platform facades.
pub struct ReferenceSetBuilder<'a> {
    cache: &'a MetadataReferenceCache,
    paths: DiscoveredPaths,
    well_known: Vec<WellKnownType>,
    extra_references: Vec<String>,
    extra_imports: Vec<String>,
}

impl<'a> ReferenceSetBuilder<'a> {
    pub fn new(cache: &'a MetadataReferenceCache, paths: DiscoveredPaths) -> Self {
        Self {
            cache,
            paths,
            well_known: env::WELL_KNOWN_TYPES.to_vec(),
            extra_references: Vec::new(),
            extra_imports: Vec::new(),
        }
    }

    pub fn with_well_known_types(mut self, types: &[WellKnownType]) -> Self {
        self.well_known = types.to_vec();
        self
    }

    pub fn with_extra_references(mut self, locations: Vec<String>) -> Self {
        self.extra_references = locations;
        self
    }

    pub fn with_extra_imports(mut self, imports: Vec<String>) -> Self {
        self.extra_imports = imports;
        self
    }

    /// Resolve everything and produce the immutable default set.
    ///
    /// Unresolvable assemblies are skipped with a warning; facades replace
    /// same-named entries wherever they sit in the order.
    pub async fn build(self) -> DefaultReferenceSet {
        let mut set = DefaultReferenceSet::default();

        let assemblies: IndexSet<&str> = self.well_known.iter().map(|t| t.assembly).collect();
        for assembly in assemblies {
            match self.cache.resolve(assembly).await {
                Ok(entry) => {
                    set.references.insert(name_key(entry.name()), entry);
                }
                Err(e) => warn!("Skipping default reference {}: {}", assembly, e),
            }
        }

        for location in &self.extra_references {
            match self.cache.resolve(location).await {
                Ok(entry) => {
                    set.references.insert(name_key(entry.name()), entry);
                }
                Err(e) => warn!("Skipping extra reference {}: {}", location, e),
            }
        }

        if let Some(root) = &self.paths.reference_assemblies {
            for facade in list_facades(&env::facades_dir_path(root)).await {
                let location = facade.to_string_lossy();
                match self.cache.resolve(&location).await {
                    Ok(entry) => {
                        let key = name_key(entry.name());
                        if set.references.insert(key.clone(), entry).is_some() {
                            debug!("Facade {} replaces default reference", key);
                        }
                        set.facades.insert(key);
                    }
                    Err(e) => warn!("Skipping facade {}: {}", facade.display(), e),
                }
            }
        }

        set.imports.extend(env::DEFAULT_IMPORTS.iter().map(|s| s.to_string()));
        set.imports
            .extend(self.well_known.iter().filter_map(|t| t.namespace()).map(str::to_string));
        set.imports.extend(self.extra_imports);

        info!(
            "Default reference set: {} references ({} facades), {} imports",
            set.references.len(),
            set.facades.len(),
            set.imports.len()
        );
        set
    }
}

/// Facade modules under `dir`, sorted by file name. A missing directory yields none.
async fn list_facades(dir: &Path) -> Vec<PathBuf> {
    let mut read_dir = match tokio::fs::read_dir(dir).await {
        Ok(read_dir) => read_dir,
        Err(e) => {
            debug!("No facade directory at {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut facades = Vec::new();
    loop {
        match read_dir.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                let is_dll = path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(env::reference::ASSEMBLY_EXTENSION));
                if is_dll {
                    facades.push(path);
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read facade directory {}: {}", dir.display(), e);
                break;
            }
        }
    }
    facades.sort();
    facades
}

//! # Script Host Composition
//!
//! Combines the reference caches, the default reference set, the session
//! registry and the diagnostics router into a single host.
//!
//! ## Core Components
//!
//! - **[`ScriptHost`]**: composition root and [`SessionStore`] implementation
//! - **[`HostConfig`]**: serializable configuration for all host components
//! - **[`HostServices`]**: collaborators injected at construction
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     ScriptHost                       │
//! │  ┌──────────────┐ ┌──────────────┐ ┌───────────────┐ │
//! │  │   Session    │ │ Diagnostics  │ │   Metadata    │ │
//! │  │   Registry   │ │    Router    │ │ Reference     │ │
//! │  │              │ │              │ │ Cache + Docs  │ │
//! │  └──────────────┘ └──────────────┘ └───────────────┘ │
//! │            shared: DefaultReferenceSet                │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use scripthost::{HostConfig, ScriptHost, SessionOpenOptions, SessionStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let host = ScriptHost::new(HostConfig::default()).await?;
//!
//!     let id = host.open(SessionOpenOptions::new("#r \"lib/Foo.dll\"\n", "."));
//!     host.reprocess(id).await;
//!     println!("directives: {:?}", host.references_directives(id).await);
//!
//!     host.close(id);
//!     host.shutdown();
//!     Ok(())
//! }
//! ```

use crate::diagnostics::{Diagnostic, DiagnosticsRouter, DiagnosticsSender};
use crate::reference::*;
use crate::session::*;
use anyhow::{Context, Result};
use async_trait::async_trait;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Directory searched first for bare assembly names
    pub runtime_directory: Option<PathBuf>,
    pub reference_assemblies_path: Option<PathBuf>,
    pub documentation_path: Option<PathBuf>,
    /// Assembly locations added to every session's default references
    pub extra_references: Vec<String>,
    pub extra_imports: Vec<String>,
    /// Schedule a directive pass as soon as a session opens
    pub reprocess_on_open: bool,
    pub log_filter: String,
    pub compilation_options: CompilationOptions,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            runtime_directory: None,
            reference_assemblies_path: None,
            documentation_path: None,
            extra_references: Vec::new(),
            extra_imports: Vec::new(),
            reprocess_on_open: true,
            log_filter: "scripthost=info".to_string(),
            compilation_options: CompilationOptions::default(),
        }
    }
}

impl HostConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse host config")
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file {}", path.as_ref().display()))?;
        Ok(())
    }
}

/// External collaborators supplied at host construction
#[derive(Clone)]
pub struct HostServices {
    pub path_discovery: Arc<dyn PathDiscovery>,
    pub resolver_factory: ResolverFactory,
}

impl HostServices {
    /// Paths taken from the config, working-directory reference resolution
    pub fn from_config(config: &HostConfig) -> Self {
        Self {
            path_discovery: Arc::new(ConfiguredPaths::new(
                config.reference_assemblies_path.clone(),
                config.documentation_path.clone(),
            )),
            resolver_factory: working_directory_resolver_factory(),
        }
    }

    pub fn with_resolver_factory(mut self, factory: ResolverFactory) -> Self {
        self.resolver_factory = factory;
        self
    }
}

/// Session host: owns every process-scoped cache and the session registry
pub struct ScriptHost {
    config: HostConfig,
    paths: DiscoveredPaths,
    cache: Arc<MetadataReferenceCache>,
    defaults: Arc<DefaultReferenceSet>,
    registry: Arc<SessionRegistry>,
    router: Arc<DiagnosticsRouter>,
    resolver_factory: ResolverFactory,
    runtime: Handle,
    diagnostics_tx: Mutex<Option<DiagnosticsSender>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl ScriptHost {
    pub async fn new(config: HostConfig) -> Result<Self> {
        let services = HostServices::from_config(&config);
        Self::with_services(config, services).await
    }

    pub async fn with_services(config: HostConfig, services: HostServices) -> Result<Self> {
        info!("Initializing script host");

        let paths = services.path_discovery.discover();
        debug!("Discovered paths: {:?}", paths);

        let search_directories: Vec<PathBuf> = config
            .runtime_directory
            .iter()
            .chain(paths.reference_assemblies.iter())
            .cloned()
            .collect();
        for dir in &search_directories {
            let exists = tokio::fs::metadata(dir)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if !exists {
                warn!("Reference search directory {} does not exist", dir.display());
            }
        }

        let documentation = Arc::new(DocumentationProviderRegistry::new(paths.clone()));
        let cache = Arc::new(MetadataReferenceCache::new(search_directories, documentation));

        let defaults = ReferenceSetBuilder::new(&cache, paths.clone())
            .with_extra_references(config.extra_references.clone())
            .with_extra_imports(config.extra_imports.clone())
            .build()
            .await;

        let runtime = Handle::try_current().context("Script host must be created inside a tokio runtime")?;
        let registry = Arc::new(SessionRegistry::new());
        let router = Arc::new(DiagnosticsRouter::new(
            registry.clone(),
            cache.clone(),
            runtime.clone(),
        ));

        let (diagnostics_tx, diagnostics_rx) = mpsc::unbounded_channel();
        let listener = router.spawn_listener(diagnostics_rx);

        info!(
            "Script host ready: {} default references, {} imports",
            defaults.len(),
            defaults.imports().len()
        );

        Ok(Self {
            config,
            paths,
            cache,
            defaults: Arc::new(defaults),
            registry,
            router,
            resolver_factory: services.resolver_factory,
            runtime,
            diagnostics_tx: Mutex::new(Some(diagnostics_tx)),
            listener: Mutex::new(Some(listener)),
        })
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn discovered_paths(&self) -> &DiscoveredPaths {
        &self.paths
    }

    pub fn default_references(&self) -> &Arc<DefaultReferenceSet> {
        &self.defaults
    }

    pub fn router(&self) -> &Arc<DiagnosticsRouter> {
        &self.router
    }

    /// Sender for the compiler engine's diagnostics notifications.
    ///
    /// `None` after [`ScriptHost::shutdown`].
    pub fn diagnostics_sender(&self) -> Option<DiagnosticsSender> {
        self.diagnostics_tx
            .lock()
            .ok()
            .and_then(|sender| sender.clone())
    }

    /// Resolve an assembly location through the shared cache
    pub async fn resolve(&self, location: &str) -> Result<ReferenceEntry, ReferenceError> {
        self.cache.resolve(location).await
    }

    pub async fn documentation_provider(&self, assembly_path: &Path) -> Arc<DocumentationProvider> {
        self.cache.documentation_provider(assembly_path).await
    }

    /// Whether the session can see an assembly with the given simple name.
    ///
    /// Checks the session's directive references first, then the default
    /// set. Unknown sessions see nothing.
    pub async fn has_reference(&self, id: SessionId, name: &str) -> bool {
        let Some(session) = self.registry.get(id) else {
            return false;
        };
        session.has_directive_reference(name).await || self.defaults.contains_name(name)
    }

    /// Run a directive pass and wait for it. `None` for unknown or closed sessions.
    pub async fn reprocess(&self, id: SessionId) -> Option<ReprocessReport> {
        let session = self.registry.get(id)?;
        reprocess_now(&session, &self.cache).await
    }

    /// Failures recorded by the latest directive pass
    pub async fn session_diagnostics(&self, id: SessionId) -> Vec<Diagnostic> {
        match self.registry.get(id) {
            Some(session) => session.resolved().await.diagnostics.clone(),
            None => Vec::new(),
        }
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Close every session and stop the diagnostics listener
    pub fn shutdown(&self) {
        for id in self.registry.session_ids() {
            self.close(id);
        }
        if let Ok(mut sender) = self.diagnostics_tx.lock() {
            sender.take();
        }
        if let Ok(mut listener) = self.listener.lock()
            && let Some(handle) = listener.take()
        {
            handle.abort();
        }
        info!("Script host shut down");
    }
}

#[async_trait]
impl SessionStore for ScriptHost {
    fn open(&self, options: SessionOpenOptions) -> SessionId {
        let compilation_options = options
            .compilation_options
            .clone()
            .unwrap_or_else(|| self.config.compilation_options.clone());
        let on_diagnostics = options.on_diagnostics.clone();

        loop {
            let id = Uuid::new_v4();
            let session = Arc::new(create_session(
                id,
                self.registry.next_project_name(),
                options.clone(),
                compilation_options.clone(),
                self.defaults.clone(),
                &self.resolver_factory,
            ));

            if !self.registry.insert(session.clone(), on_diagnostics.clone()) {
                warn!("Session id collision for {}, retrying", id);
                continue;
            }

            info!("Opened session {} ({})", id, session.project().name);
            if self.config.reprocess_on_open {
                schedule_reprocess(session, self.cache.clone(), &self.runtime);
            }
            return id;
        }
    }

    fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.registry.get(id)
    }

    async fn update(&self, id: SessionId, snapshot: SolutionSnapshot) -> Result<UpdateOutcome, SessionError> {
        let Some(session) = self.registry.get(id) else {
            return Ok(UpdateOutcome::SessionNotFound);
        };
        match update_session(&session, snapshot).await {
            Ok(version) => Ok(UpdateOutcome::Applied { version }),
            Err(SessionError::Closed(_)) => Ok(UpdateOutcome::SessionNotFound),
            Err(e) => {
                debug!("Update rejected: {}", e);
                Err(e)
            }
        }
    }

    fn close(&self, id: SessionId) -> bool {
        if let Some(session) = self.registry.get(id) {
            session.close();
        }
        let removed = self.registry.remove(id);
        if removed.is_some() {
            info!("Closed session {}", id);
        }
        removed.is_some()
    }

    async fn references_directives(&self, id: SessionId) -> IndexSet<String> {
        match self.registry.get(id) {
            Some(session) => session.references_directives().await,
            None => IndexSet::new(),
        }
    }
}

impl Drop for ScriptHost {
    fn drop(&mut self) {
        if let Ok(mut listener) = self.listener.lock()
            && let Some(handle) = listener.take()
        {
            handle.abort();
        }
    }
}

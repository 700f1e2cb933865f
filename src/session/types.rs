use crate::diagnostics::{Diagnostic, DiagnosticsCallback};
use crate::reference::{DefaultReferenceSet, ReferenceEntry};
use crate::session::reprocess::ReprocessGate;
use crate::session::resolver::{MetadataReferenceResolver, SourceFileResolver};
use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLockReadGuard};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub type SessionId = Uuid;

/// Callback invoked with the new document text after an update is applied
pub type TextChangedCallback = Arc<dyn Fn(SessionId, &str) + Send + Sync>;

/// Compiler options carried by every script project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilationOptions {
    pub language_version: String,
    pub optimize: bool,
    pub allow_unsafe: bool,
    pub check_overflow: bool,
    pub warning_level: u8,
}

impl Default for CompilationOptions {
    fn default() -> Self {
        Self {
            language_version: "latest".to_string(),
            optimize: false,
            allow_unsafe: true,
            check_overflow: false,
            warning_level: 4,
        }
    }
}

/// Immutable view of a session document at one version.
///
/// Edits derive a new snapshot with [`SolutionSnapshot::with_text`]; the
/// derived snapshot remembers the version it was based on so a concurrent
/// update can be detected instead of overwritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionSnapshot {
    pub version: u64,
    pub base_version: u64,
    pub text: Arc<str>,
    pub options: CompilationOptions,
}

impl SolutionSnapshot {
    pub fn initial(text: impl Into<Arc<str>>, options: CompilationOptions) -> Self {
        Self {
            version: 0,
            base_version: 0,
            text: text.into(),
            options,
        }
    }

    pub fn with_text(&self, text: impl Into<Arc<str>>) -> Self {
        Self {
            version: self.version + 1,
            base_version: self.version,
            text: text.into(),
            options: self.options.clone(),
        }
    }

    pub fn with_options(&self, options: CompilationOptions) -> Self {
        Self {
            version: self.version + 1,
            base_version: self.version,
            text: self.text.clone(),
            options,
        }
    }
}

/// Compilation unit description handed to the compiler engine
pub struct ScriptProject {
    /// Sequential, process-unique project name
    pub name: String,
    pub document_name: String,
    pub working_directory: PathBuf,
    pub default_references: Arc<DefaultReferenceSet>,
    pub reference_resolver: Arc<dyn MetadataReferenceResolver>,
    pub source_resolver: SourceFileResolver,
}

impl ScriptProject {
    pub fn imports(&self) -> &IndexSet<String> {
        self.default_references.imports()
    }
}

impl fmt::Debug for ScriptProject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptProject")
            .field("name", &self.name)
            .field("document_name", &self.document_name)
            .field("working_directory", &self.working_directory)
            .field("default_references", &self.default_references.len())
            .finish_non_exhaustive()
    }
}

/// Outcome of the latest reference-directive pass.
///
/// Replaced as a whole, so readers never see a mix of two passes.
#[derive(Debug, Clone, Default)]
pub struct ResolvedDirectives {
    /// Successfully resolved `#r` arguments, in source order
    pub directives: IndexSet<String>,
    pub references: Vec<ReferenceEntry>,
    /// Files named by `#load` directives that exist
    pub loaded_sources: Vec<PathBuf>,
    /// Failures recorded during the pass
    pub diagnostics: Vec<Diagnostic>,
    /// Document version the pass scanned
    pub text_version: u64,
    /// Sequence number of the pass for this session, starting at 1
    pub pass: u64,
}

#[derive(Debug)]
pub(crate) struct SessionState {
    pub(crate) snapshot: SolutionSnapshot,
    pub(crate) resolved: Arc<ResolvedDirectives>,
}

/// One open script document and its compilation state
pub struct Session {
    pub(crate) id: SessionId,
    pub(crate) project: ScriptProject,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) state: RwLock<SessionState>,
    pub(crate) on_text_changed: Option<TextChangedCallback>,
    pub(crate) cancel: CancellationToken,
    pub(crate) reprocess: ReprocessGate,
    /// True while diagnostics may be delivered; cleared by close
    pub(crate) delivery: std::sync::RwLock<bool>,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn project(&self) -> &ScriptProject {
        &self.project
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn working_directory(&self) -> &Path {
        &self.project.working_directory
    }

    /// Closed sessions accept no updates and discard in-flight passes
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether a scheduled directive pass is waiting to start
    pub fn reprocess_pending(&self) -> bool {
        self.reprocess.is_pending()
    }

    /// Token cancelled when the session closes
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub async fn snapshot(&self) -> SolutionSnapshot {
        self.state.read().await.snapshot.clone()
    }

    pub async fn text(&self) -> Arc<str> {
        self.state.read().await.snapshot.text.clone()
    }

    pub async fn version(&self) -> u64 {
        self.state.read().await.snapshot.version
    }

    pub async fn resolved(&self) -> Arc<ResolvedDirectives> {
        self.state.read().await.resolved.clone()
    }

    pub async fn references_directives(&self) -> IndexSet<String> {
        self.resolved().await.directives.clone()
    }

    /// Default references followed by directive references not already present
    pub async fn references(&self) -> Vec<ReferenceEntry> {
        let resolved = self.resolved().await;
        let mut references: Vec<ReferenceEntry> =
            self.project.default_references.references().cloned().collect();
        for entry in &resolved.references {
            if !references.iter().any(|existing| existing.same_as(entry)) {
                references.push(entry.clone());
            }
        }
        references
    }

    /// Whether a directive-resolved reference carries the given simple name
    pub async fn has_directive_reference(&self, name: &str) -> bool {
        self.resolved()
            .await
            .references
            .iter()
            .any(|entry| entry.reference.matches_name(name))
    }

    /// Shared hold on diagnostics delivery, `None` once the session closed.
    ///
    /// Close waits for every outstanding guard, so a callback invoked under
    /// the guard never runs after close has returned.
    pub(crate) fn delivery_guard(&self) -> Option<RwLockReadGuard<'_, bool>> {
        let open = self.delivery.read().unwrap_or_else(PoisonError::into_inner);
        (*open && !self.is_closed()).then_some(open)
    }

    pub(crate) fn close(&self) {
        let mut open = self.delivery.write().unwrap_or_else(PoisonError::into_inner);
        *open = false;
        self.cancel.cancel();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("project", &self.project)
            .field("created_at", &self.created_at)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Options for opening a session
#[derive(Clone, Default)]
pub struct SessionOpenOptions {
    pub text: String,
    pub working_directory: PathBuf,
    /// Falls back to the host's configured options
    pub compilation_options: Option<CompilationOptions>,
    pub on_diagnostics: Option<DiagnosticsCallback>,
    pub on_text_changed: Option<TextChangedCallback>,
}

impl SessionOpenOptions {
    pub fn new(text: impl Into<String>, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            text: text.into(),
            working_directory: working_directory.into(),
            ..Default::default()
        }
    }

    pub fn with_compilation_options(mut self, options: CompilationOptions) -> Self {
        self.compilation_options = Some(options);
        self
    }

    pub fn on_diagnostics(mut self, callback: DiagnosticsCallback) -> Self {
        self.on_diagnostics = Some(callback);
        self
    }

    pub fn on_text_changed(mut self, callback: TextChangedCallback) -> Self {
        self.on_text_changed = Some(callback);
        self
    }
}

impl fmt::Debug for SessionOpenOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOpenOptions")
            .field("text_len", &self.text.len())
            .field("working_directory", &self.working_directory)
            .field("compilation_options", &self.compilation_options)
            .field("on_diagnostics", &self.on_diagnostics.is_some())
            .field("on_text_changed", &self.on_text_changed.is_some())
            .finish()
    }
}

/// Result of applying an update through the session store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied { version: u64 },
    /// The session was closed or never existed; nothing was changed
    SessionNotFound,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("Session {0} is closed")]
    Closed(SessionId),
    #[error(
        "Stale snapshot for session {session_id}: based on version {based_on}, current version is {current}"
    )]
    StaleSnapshot {
        session_id: SessionId,
        based_on: u64,
        current: u64,
    },
}

impl SessionError {
    /// Stale snapshots can be retried against a fresh snapshot
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::StaleSnapshot { .. })
    }
}

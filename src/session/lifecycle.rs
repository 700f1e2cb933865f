//! Session creation, updates and reference-directive reprocessing.
//!
//! Sessions are plain records; these functions are the only code that
//! mutates their state.

use crate::diagnostics::Diagnostic;
use crate::env;
use crate::reference::{DefaultReferenceSet, MetadataReferenceCache};
use crate::session::directives::{DirectiveKind, scan_directives};
use crate::session::reprocess::ReprocessGate;
use crate::session::resolver::{ResolverFactory, SourceFileResolver};
use crate::session::types::*;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Summary of one reprocessing pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReprocessReport {
    pub pass: u64,
    pub text_version: u64,
    pub resolved: usize,
    pub failures: usize,
    /// False when the session closed before the result could be stored
    pub committed: bool,
}

/// Build a session holding one script project and one document.
pub fn create_session(
    id: SessionId,
    project_name: String,
    options: SessionOpenOptions,
    compilation_options: CompilationOptions,
    defaults: Arc<DefaultReferenceSet>,
    resolver_factory: &ResolverFactory,
) -> Session {
    let working_directory = std::path::absolute(&options.working_directory)
        .unwrap_or_else(|_| options.working_directory.clone());

    let project = ScriptProject {
        name: project_name,
        document_name: env::session::DOCUMENT_NAME.to_string(),
        reference_resolver: resolver_factory(&working_directory),
        source_resolver: SourceFileResolver::new(working_directory.clone()),
        working_directory,
        default_references: defaults,
    };

    debug!(
        "Created project {} for session {} in {}",
        project.name,
        id,
        project.working_directory.display()
    );

    Session {
        id,
        project,
        created_at: Utc::now(),
        state: RwLock::new(SessionState {
            snapshot: SolutionSnapshot::initial(options.text, compilation_options),
            resolved: Arc::new(ResolvedDirectives::default()),
        }),
        on_text_changed: options.on_text_changed,
        cancel: CancellationToken::new(),
        reprocess: ReprocessGate::default(),
        delivery: std::sync::RwLock::new(true),
    }
}

/// Apply a snapshot derived from the session's current snapshot.
///
/// Returns the new version. A snapshot derived from an older version is
/// rejected with [`SessionError::StaleSnapshot`] so the caller can re-read
/// and retry.
pub async fn update_session(session: &Session, snapshot: SolutionSnapshot) -> Result<u64, SessionError> {
    let (text, version) = {
        let mut state = session.state.write().await;
        if session.is_closed() {
            return Err(SessionError::Closed(session.id));
        }

        let current = state.snapshot.version;
        if snapshot.base_version != current || snapshot.version <= current {
            return Err(SessionError::StaleSnapshot {
                session_id: session.id,
                based_on: snapshot.base_version,
                current,
            });
        }

        let text = snapshot.text.clone();
        state.snapshot = snapshot;
        debug!("Session {} updated to version {}", session.id, state.snapshot.version);
        (text, state.snapshot.version)
    };

    if let Some(callback) = &session.on_text_changed {
        callback(session.id, &text);
    }
    Ok(version)
}

/// Re-scan the session text for directives and swap in the resolved set.
///
/// A directive that fails to resolve is recorded as a diagnostic and does
/// not stop the remaining directives. The new set replaces the previous one
/// in a single assignment under the state lock.
pub async fn reprocess_reference_directives(
    session: &Session,
    cache: &MetadataReferenceCache,
) -> ReprocessReport {
    let snapshot = session.snapshot().await;
    let mut resolved = ResolvedDirectives {
        text_version: snapshot.version,
        ..Default::default()
    };

    let mut seen = HashSet::new();
    for directive in scan_directives(&snapshot.text) {
        if !seen.insert((directive.kind, directive.value.clone())) {
            continue;
        }

        match directive.kind {
            DirectiveKind::Reference => {
                let outcome = match session
                    .project
                    .reference_resolver
                    .resolve_directive(&directive.value)
                    .await
                {
                    Ok(location) => cache.resolve(&location).await,
                    Err(e) => Err(e),
                };

                match outcome {
                    Ok(entry) => {
                        resolved.directives.insert(directive.value);
                        if !resolved.references.iter().any(|r| r.same_as(&entry)) {
                            resolved.references.push(entry);
                        }
                    }
                    Err(e) => {
                        warn!(
                            "Session {}: reference directive '{}' failed: {}",
                            session.id, directive.value, e
                        );
                        resolved.diagnostics.push(
                            Diagnostic::error(
                                env::session::DIRECTIVE_FAILURE_CODE,
                                format!("Unable to resolve reference '{}': {}", directive.value, e),
                            )
                            .at_line(directive.line),
                        );
                    }
                }
            }
            DirectiveKind::Load => {
                let path = session.project.source_resolver.resolve(&directive.value);
                let exists = tokio::fs::metadata(&path)
                    .await
                    .map(|m| m.is_file())
                    .unwrap_or(false);
                if exists {
                    resolved.loaded_sources.push(path);
                } else {
                    resolved.diagnostics.push(
                        Diagnostic::warning(
                            env::session::LOAD_FAILURE_CODE,
                            format!("Script file not found: {}", path.display()),
                        )
                        .at_line(directive.line),
                    );
                }
            }
        }
    }

    let mut report = ReprocessReport {
        pass: 0,
        text_version: resolved.text_version,
        resolved: resolved.references.len(),
        failures: resolved.diagnostics.len(),
        committed: false,
    };

    let mut state = session.state.write().await;
    if session.is_closed() {
        debug!("Session {} closed during reprocessing; discarding result", session.id);
        return report;
    }
    resolved.pass = state.resolved.pass + 1;
    report.pass = resolved.pass;
    report.committed = true;
    state.resolved = Arc::new(resolved);

    info!(
        "Session {} reprocessed directives (pass {}): {} resolved, {} failed",
        session.id, report.pass, report.resolved, report.failures
    );
    report
}

use crate::diagnostics::DiagnosticsCallback;
use crate::env;
use crate::session::types::{Session, SessionId};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Concurrent map of open sessions and their diagnostics callbacks.
///
/// The only place sessions are created or destroyed. Removal always drops
/// the diagnostics callback first, whether or not the session itself is
/// still registered.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
    notifiers: DashMap<SessionId, DiagnosticsCallback>,
    project_counter: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next sequential project name; never repeats within the process
    pub fn next_project_name(&self) -> String {
        let n = self.project_counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}{}", env::session::PROJECT_NAME_PREFIX, n)
    }

    /// Register a session. Returns false if the id is already taken.
    pub fn insert(&self, session: Arc<Session>, on_diagnostics: Option<DiagnosticsCallback>) -> bool {
        let id = session.id();
        match self.sessions.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                if let Some(callback) = on_diagnostics {
                    self.notifiers.insert(id, callback);
                }
                vacant.insert(session);
                true
            }
        }
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn notifier(&self, id: SessionId) -> Option<DiagnosticsCallback> {
        self.notifiers.get(&id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        if self.notifiers.remove(&id).is_some() {
            debug!("Diagnostics callback removed for session {}", id);
        }
        self.sessions.remove(&id).map(|(_, session)| session)
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn notifier_count(&self) -> usize {
        self.notifiers.len()
    }
}

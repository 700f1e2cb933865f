use crate::session::types::*;
use async_trait::async_trait;
use indexmap::IndexSet;
use std::sync::Arc;

/// Capability to open, read, update and close script sessions.
///
/// Operations on an unknown session never fail: lookups return `None` or an
/// empty result and `close` is a no-op, since sessions may close while an
/// operation on them is in flight.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Open a session and return its identifier
    fn open(&self, options: SessionOpenOptions) -> SessionId;

    fn get(&self, id: SessionId) -> Option<Arc<Session>>;

    /// Apply an updated snapshot; stale snapshots are reported for retry
    async fn update(&self, id: SessionId, snapshot: SolutionSnapshot) -> Result<UpdateOutcome, SessionError>;

    /// Close a session. Returns whether a session was actually removed.
    fn close(&self, id: SessionId) -> bool;

    /// Currently recognized reference directives, empty for unknown sessions
    async fn references_directives(&self, id: SessionId) -> IndexSet<String>;
}

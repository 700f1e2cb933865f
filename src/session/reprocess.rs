//! Per-session scheduling of directive reprocessing.
//!
//! At most one pass runs per session and at most one more waits behind it.
//! Requests arriving while a pass is already waiting are coalesced into that
//! pass, which reads the newest text once it starts. Passes run as spawned
//! tasks that stop early when the session's cancellation token fires.

use crate::reference::MetadataReferenceCache;
use crate::session::lifecycle::{ReprocessReport, reprocess_reference_directives};
use crate::session::types::Session;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
pub struct ReprocessGate {
    pass_lock: Mutex<()>,
    pending: AtomicBool,
    coalesced: AtomicU64,
}

impl ReprocessGate {
    /// Whether a scheduled pass has not started yet
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Number of requests folded into an already pending pass
    pub fn coalesced_requests(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A new pass was spawned
    Scheduled,
    /// A pass was already waiting and will pick up this request
    Coalesced,
    /// The session is closed
    Closed,
}

/// Request a reprocessing pass without waiting for it.
pub fn schedule_reprocess(
    session: Arc<Session>,
    cache: Arc<MetadataReferenceCache>,
    runtime: &Handle,
) -> ScheduleOutcome {
    if session.is_closed() {
        return ScheduleOutcome::Closed;
    }
    if session.reprocess.pending.swap(true, Ordering::AcqRel) {
        session.reprocess.coalesced.fetch_add(1, Ordering::Relaxed);
        return ScheduleOutcome::Coalesced;
    }

    runtime.spawn(async move {
        let cancel = session.cancellation_token().clone();
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Reprocessing for session {} cancelled", session.id());
            }
            _ = run_pass(&session, &cache, true) => {}
        }
    });
    ScheduleOutcome::Scheduled
}

/// Run a pass now, after any pass already in flight for the session.
pub async fn reprocess_now(session: &Session, cache: &MetadataReferenceCache) -> Option<ReprocessReport> {
    run_pass(session, cache, false).await
}

async fn run_pass(
    session: &Session,
    cache: &MetadataReferenceCache,
    scheduled: bool,
) -> Option<ReprocessReport> {
    let _guard = session.reprocess.pass_lock.lock().await;
    if scheduled {
        session.reprocess.pending.store(false, Ordering::Release);
    }
    if session.is_closed() {
        return None;
    }
    Some(reprocess_reference_directives(session, cache).await)
}

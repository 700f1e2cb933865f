use crate::diagnostics::types::*;
use crate::reference::MetadataReferenceCache;
use crate::session::{ScheduleOutcome, SessionRegistry, schedule_reprocess};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// What happened to one diagnostics notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Unknown or closed session; nothing ran
    Dropped,
    /// Reprocessing requested, no callback registered
    NoCallback,
    /// Reprocessing requested and the callback invoked
    Delivered,
}

/// Routes compiler-engine diagnostics notifications to their sessions.
pub struct DiagnosticsRouter {
    registry: Arc<SessionRegistry>,
    cache: Arc<MetadataReferenceCache>,
    runtime: Handle,
}

impl DiagnosticsRouter {
    pub fn new(registry: Arc<SessionRegistry>, cache: Arc<MetadataReferenceCache>, runtime: Handle) -> Self {
        Self {
            registry,
            cache,
            runtime,
        }
    }

    /// Handle one notification. Safe to call from any thread.
    ///
    /// Reprocessing is scheduled on the runtime and never awaited here; the
    /// session's callback, if any, runs synchronously on the calling thread.
    pub fn on_diagnostics_updated(&self, event: &DiagnosticsUpdated) -> Delivery {
        let Some(session) = self.registry.get(event.session_id) else {
            debug!("Dropping diagnostics for unknown session {}", event.session_id);
            return Delivery::Dropped;
        };
        // Held until the callback returns so close cannot overtake delivery
        let Some(_delivery) = session.delivery_guard() else {
            debug!("Dropping diagnostics for closed session {}", event.session_id);
            return Delivery::Dropped;
        };

        match schedule_reprocess(session.clone(), self.cache.clone(), &self.runtime) {
            ScheduleOutcome::Closed => return Delivery::Dropped,
            ScheduleOutcome::Coalesced => {
                debug!("Reprocessing for session {} already pending", event.session_id)
            }
            ScheduleOutcome::Scheduled => {}
        }

        match self.registry.notifier(event.session_id) {
            Some(callback) => {
                callback(event);
                Delivery::Delivered
            }
            None => Delivery::NoCallback,
        }
    }

    /// Drain a notification channel in order until every sender is dropped.
    pub fn spawn_listener(self: &Arc<Self>, mut receiver: DiagnosticsReceiver) -> JoinHandle<()> {
        let router = Arc::clone(self);
        self.runtime.spawn(async move {
            while let Some(event) = receiver.recv().await {
                router.on_diagnostics_updated(&event);
            }
            info!("Diagnostics listener stopped");
        })
    }
}

//! Session-keyed progress routing.
//!
//! One live delivery endpoint per session, fed by whichever job tasks are
//! rendering for that session. Delivery is best-effort: no endpoint means
//! the event is dropped, never buffered or retried.

use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use slidecast_models::{SessionId, StatusEvent};

/// Events buffered per endpoint before sends start getting dropped.
pub const DEFAULT_EVENT_BUFFER: usize = 64;

/// Registry mapping sessions to their live delivery endpoint.
///
/// Registration follows the transport's connection lifecycle: connect
/// registers, disconnect deregisters, and a reconnect simply overwrites
/// the previous endpoint (last writer wins).
#[derive(Debug, Default)]
pub struct ProgressRouter {
    endpoints: RwLock<HashMap<SessionId, mpsc::Sender<StatusEvent>>>,
}

impl ProgressRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session and return the receiving half of its endpoint.
    ///
    /// Any previously registered endpoint for the session is replaced;
    /// its receiver starts seeing `None` once in-flight sends drain.
    pub async fn register(&self, session: &SessionId) -> mpsc::Receiver<StatusEvent> {
        let (tx, rx) = mpsc::channel(DEFAULT_EVENT_BUFFER);
        let mut endpoints = self.endpoints.write().await;
        if endpoints.insert(session.clone(), tx).is_some() {
            debug!(session = %session, "replaced existing progress endpoint");
        }
        rx
    }

    /// Drop the endpoint for a session, if any.
    pub async fn deregister(&self, session: &SessionId) {
        self.endpoints.write().await.remove(session);
    }

    /// Deliver an event to the session's endpoint.
    ///
    /// Returns whether the event was accepted. A missing, closed, or full
    /// endpoint drops the event silently; a closed endpoint is removed on
    /// the way out.
    pub async fn route(&self, session: &SessionId, event: StatusEvent) -> bool {
        {
            let endpoints = self.endpoints.read().await;
            match endpoints.get(session) {
                None => return false,
                Some(tx) => match tx.try_send(event) {
                    Ok(()) => return true,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        debug!(session = %session, "progress endpoint full, dropping event");
                        return false;
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {}
                },
            }
        }

        // receiver went away under us, prune the stale endpoint
        self.endpoints.write().await.remove(session);
        false
    }

    /// Whether the session currently has a live endpoint.
    pub async fn is_registered(&self, session: &SessionId) -> bool {
        self.endpoints.read().await.contains_key(session)
    }

    /// Number of live endpoints.
    pub async fn len(&self) -> usize {
        self.endpoints.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.endpoints.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slidecast_models::JobId;

    #[tokio::test]
    async fn test_route_delivers_to_registered_session() {
        let router = ProgressRouter::new();
        let session = SessionId::new();
        let mut rx = router.register(&session).await;

        assert!(router.route(&session, StatusEvent::queued(JobId::new())).await);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.status.as_str(), "queued");
    }

    #[tokio::test]
    async fn test_route_drops_without_endpoint() {
        let router = ProgressRouter::new();
        let session = SessionId::new();

        assert!(!router.route(&session, StatusEvent::queued(JobId::new())).await);

        let mut rx = router.register(&session).await;
        router.deregister(&session).await;
        assert!(!router.route(&session, StatusEvent::queued(JobId::new())).await);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_reconnect_last_writer_wins() {
        let router = ProgressRouter::new();
        let session = SessionId::new();

        let mut first = router.register(&session).await;
        let mut second = router.register(&session).await;
        assert_eq!(router.len().await, 1);

        assert!(router.route(&session, StatusEvent::queued(JobId::new())).await);
        assert!(first.recv().await.is_none());
        assert!(second.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_closed_endpoint_is_pruned() {
        let router = ProgressRouter::new();
        let session = SessionId::new();

        let rx = router.register(&session).await;
        drop(rx);

        assert!(!router.route(&session, StatusEvent::queued(JobId::new())).await);
        assert!(!router.is_registered(&session).await);
    }

    #[tokio::test]
    async fn test_events_arrive_in_send_order() {
        let router = ProgressRouter::new();
        let session = SessionId::new();
        let mut rx = router.register(&session).await;
        let job = JobId::new();

        for pct in [10, 40, 90] {
            router
                .route(&session, StatusEvent::rendering(job.clone(), pct))
                .await;
        }

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event.progress);
        }
        assert_eq!(seen, vec![10, 40, 90]);
    }
}

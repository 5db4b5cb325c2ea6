//! ABOUTME: Progress event bus for ARIS research sessions
//! ABOUTME: A single-process broadcast pub/sub; no persistence, correlation, or cross-process bridge since ARIS is one process, one language

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

use aris_core::SessionId;

/// A progress event emitted at every orchestrator state transition and
/// budget-warning threshold; every terminal state emits a structured
/// summary of the session outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchEvent {
    pub id: Uuid,
    pub session_id: SessionId,
    pub emitted_at: DateTime<Utc>,
    pub kind: ResearchEventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResearchEventKind {
    SessionCreated {
        query: String,
    },
    StateTransition {
        from: String,
        to: String,
    },
    HopStarted {
        hop_number: u32,
    },
    HopCompleted {
        hop_number: u32,
        confidence_after: f64,
    },
    BudgetWarning {
        threshold: f64,
        accumulated: f64,
        limit: f64,
    },
    EmbeddingDegraded {
        reason: String,
    },
    GateDecision {
        decision: String,
        document_id: Option<String>,
    },
    SessionCompleted {
        status: String,
        hops_completed: u32,
        total_cost: f64,
        confidence_reached: f64,
    },
    Error {
        kind: String,
        message: String,
    },
}

impl ResearchEvent {
    #[must_use]
    pub fn new(session_id: SessionId, kind: ResearchEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            emitted_at: Utc::now(),
            kind,
        }
    }
}

/// Broadcast-channel backed event bus. Subscribers that lag behind the
/// channel capacity miss events (per `tokio::sync::broadcast` semantics) —
/// acceptable for a progress stream where the durable record lives in the
/// Session Store, not the bus.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ResearchEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResearchEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event. Returns the number of active subscribers that
    /// received it; `0` is not an error, it just means nobody is listening.
    pub fn publish(&self, event: ResearchEvent) -> usize {
        trace!(session_id = %event.session_id, kind = ?event.kind, "publishing research event");
        self.sender.send(event).map(|n| n).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let session_id = SessionId::new();

        bus.publish(ResearchEvent::new(
            session_id,
            ResearchEventKind::SessionCreated {
                query: "what is semantic search?".into(),
            },
        ));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.session_id, session_id);
        assert!(matches!(
            received.kind,
            ResearchEventKind::SessionCreated { .. }
        ));
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        let n = bus.publish(ResearchEvent::new(
            SessionId::new(),
            ResearchEventKind::BudgetWarning {
                threshold: 0.75,
                accumulated: 0.4,
                limit: 0.5,
            },
        ));
        assert_eq!(n, 0);
    }
}

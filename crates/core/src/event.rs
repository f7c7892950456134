//! Conversation events: decoupled notifications about what a turn did.
//!
//! The orchestrator publishes events after a turn is committed. The CLI or
//! any other observer can subscribe without touching the session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::schema::CollectorId;

/// Everything the turn pipeline reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConversationEvent {
    /// The router picked a target
    TurnRouted {
        session_id: String,
        target: Option<CollectorId>,
        confidence: f64,
        timestamp: DateTime<Utc>,
    },

    /// The router's classification was rejected
    RoutingFailed {
        session_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A collector merged new values
    FieldsMerged {
        session_id: String,
        collector: CollectorId,
        fields: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// A collector has every required field
    CollectorCompleted {
        session_id: String,
        collector: CollectorId,
        timestamp: DateTime<Utc>,
    },

    /// A document was loaded
    DocumentIngested {
        session_id: String,
        filename: String,
        page_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A document could not be loaded
    IngestFailed {
        session_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<ConversationEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: ConversationEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ConversationEvent>> {
        self.sender.subscribe()
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
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(ConversationEvent::CollectorCompleted {
            session_id: "s1".into(),
            collector: CollectorId::Beta,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            ConversationEvent::CollectorCompleted { collector, .. } => {
                assert_eq!(*collector, CollectorId::Beta);
            }
            _ => panic!("Expected CollectorCompleted event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(4);
        bus.publish(ConversationEvent::IngestFailed {
            session_id: "s1".into(),
            reason: "missing".into(),
            timestamp: Utc::now(),
        });
    }
}

use crate::events::{EventKind, TimelineEvent};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Fire-and-forget event publisher for lifecycle events.
///
/// Publication never fails the caller: a channel without subscribers is
/// acceptable, and orchestration state is never rolled back on a delivery
/// problem.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub topic: String,
    pub payload: Value,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a payload on a topic. No subscribers is not an error.
    pub fn publish(&self, topic: impl Into<String>, payload: Value) {
        let event = PublishedEvent {
            topic: topic.into(),
            payload,
            published_at: chrono::Utc::now(),
        };
        if let Err(broadcast::error::SendError(dropped)) = self.sender.send(event) {
            tracing::trace!(topic = %dropped.topic, "No subscribers for published event");
        }
    }

    /// Record a timeline event and publish it under its kind as topic.
    pub fn record_event(&self, kind: EventKind, subject_ids: &[Uuid], message: impl Into<String>) {
        let event = TimelineEvent {
            kind,
            subject_ids: subject_ids.to_vec(),
            message: message.into(),
        };
        let payload = serde_json::to_value(&event).unwrap_or(Value::Null);
        self.publish(kind.to_string(), payload);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}

//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`GenerationEvent`]s. It is
//! shared via `Arc<EventBus>` between the orchestrators that publish and the
//! WebSocket sessions that forward events to the UI.

use aiyou_core::lifecycle::GroupStatus;
use aiyou_core::types::{DbId, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// GenerationEvent
// ---------------------------------------------------------------------------

/// A state change of one task group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationEvent {
    pub group_id: DbId,
    pub project_id: String,
    #[serde(flatten)]
    pub kind: GenerationEventKind,
    pub timestamp: Timestamp,
}

/// What happened to the group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEventKind {
    /// Live status or progress update.
    StatusChanged {
        status: GroupStatus,
        /// Completion percentage (0-100).
        progress: u8,
    },

    /// The group finished with a media URL.
    Completed { result_url: String, model_id: String },

    /// The group failed terminally.
    Failed {
        /// Human-readable error description.
        error: String,
        model_id: Option<String>,
    },

    /// The group was cancelled and is back to `prompt_ready`.
    Cancelled,
}

impl GenerationEvent {
    /// Create an event stamped with the current time.
    pub fn new(group_id: DbId, project_id: impl Into<String>, kind: GenerationEventKind) -> Self {
        Self {
            group_id,
            project_id: project_id.into(),
            kind,
            timestamp: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            GenerationEventKind::Completed { .. } | GenerationEventKind::Failed { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`GenerationEvent`].
pub struct EventBus {
    sender: broadcast::Sender<GenerationEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: GenerationEvent) {
        tracing::trace!(group_id = event.group_id, kind = ?event.kind, "Publishing event");
        // Ignore the SendError; it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<GenerationEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(GenerationEvent::new(
            7,
            "proj-1",
            GenerationEventKind::StatusChanged {
                status: GroupStatus::Processing,
                progress: 40,
            },
        ));

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.group_id, 7);
        assert_eq!(received.project_id, "proj-1");
        assert!(!received.is_terminal());
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(GenerationEvent::new(1, "p", GenerationEventKind::Cancelled));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(e1, e2);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(GenerationEvent::new(1, "p", GenerationEventKind::Cancelled));
    }

    #[test]
    fn event_serializes_with_flat_type_tag() {
        let event = GenerationEvent::new(
            3,
            "p",
            GenerationEventKind::Completed {
                result_url: "https://cdn/v.mp4".into(),
                model_id: "sora-2".into(),
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "completed");
        assert_eq!(json["group_id"], 3);
        assert_eq!(json["result_url"], "https://cdn/v.mp4");
        assert!(event.is_terminal());

        let status = serde_json::to_value(GenerationEvent::new(
            3,
            "p",
            GenerationEventKind::StatusChanged {
                status: GroupStatus::PromptReady,
                progress: 0,
            },
        ))
        .unwrap();
        assert_eq!(status["type"], "status_changed");
        assert_eq!(status["status"], "prompt_ready");
    }
}

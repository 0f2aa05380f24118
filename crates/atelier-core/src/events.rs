//! Editor event types, envelope, and event bus.
//!
//! Sessions publish upload progress, skipped mutations, state changes and
//! submit results on a broadcast channel. The admin UI subscribes to surface
//! messages; other consumers (audit logging, tests) subscribe independently.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{DocumentRef, TaskId, UploadTarget};

// ============================================================================
// Event Envelope
// ============================================================================

/// Versioned wrapper around an [`EditorEvent`].
///
/// `event_type` uses dot-namespaced names (e.g. `"upload.failed"`).
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// Unique event identifier (UUIDv7 for temporal ordering).
    pub event_id: Uuid,
    /// Namespaced event type.
    pub event_type: String,
    /// When the event occurred (UTC).
    pub occurred_at: DateTime<Utc>,
    /// Document the emitting session edits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentRef>,
    /// Payload schema version.
    pub payload_version: u32,
    pub payload: EditorEvent,
}

impl EventEnvelope {
    pub fn new(event: EditorEvent, document: Option<DocumentRef>) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type: event.event_type().to_string(),
            occurred_at: Utc::now(),
            document,
            payload_version: 1,
            payload: event,
        }
    }
}

// ============================================================================
// Editor Event (domain payloads)
// ============================================================================

/// Events emitted by an edit session.
///
/// Serialized as JSON with a `type` tag, e.g.
/// `{"type":"UploadFailed","task_id":"...","message":"File too large"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum EditorEvent {
    /// The session finished loading its document.
    DocumentLoaded {
        /// `"found"`, `"not_found"` or `"failed"`.
        outcome: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Session state machine moved.
    StateChanged { from: String, to: String },
    /// An upload task was accepted and is in flight.
    UploadStarted {
        task_id: TaskId,
        target: UploadTarget,
        filename: String,
    },
    /// An upload succeeded and its location was written to the record.
    UploadSucceeded {
        task_id: TaskId,
        target: UploadTarget,
        location: String,
    },
    /// An upload failed; the field keeps its previous value.
    UploadFailed {
        task_id: TaskId,
        target: UploadTarget,
        message: String,
    },
    /// An upload result arrived but its target no longer applies.
    UploadDiscarded {
        task_id: TaskId,
        target: UploadTarget,
        reason: String,
    },
    /// A mutation addressed an element that no longer exists.
    MutationSkipped { key: String, reason: String },
    /// Related-entity summaries could not be fetched.
    RelatedEntitiesUnavailable { collection: String, message: String },
    /// The document was saved.
    Submitted,
    /// Saving failed; the record is kept for a retry.
    SubmitFailed { message: String },
}

impl EditorEvent {
    /// Namespaced event type for the envelope.
    pub fn event_type(&self) -> &'static str {
        match self {
            EditorEvent::DocumentLoaded { .. } => "document.loaded",
            EditorEvent::StateChanged { .. } => "session.state_changed",
            EditorEvent::UploadStarted { .. } => "upload.started",
            EditorEvent::UploadSucceeded { .. } => "upload.succeeded",
            EditorEvent::UploadFailed { .. } => "upload.failed",
            EditorEvent::UploadDiscarded { .. } => "upload.discarded",
            EditorEvent::MutationSkipped { .. } => "mutation.skipped",
            EditorEvent::RelatedEntitiesUnavailable { .. } => "related.unavailable",
            EditorEvent::Submitted => "document.submitted",
            EditorEvent::SubmitFailed { .. } => "document.submit_failed",
        }
    }

    /// Whether the event should be shown to the user as a notice.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            EditorEvent::UploadFailed { .. }
                | EditorEvent::SubmitFailed { .. }
                | EditorEvent::RelatedEntitiesUnavailable { .. }
                | EditorEvent::DocumentLoaded {
                    message: Some(_),
                    ..
                }
        )
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast-based event bus.
///
/// Slow receivers that fall behind get `Lagged` and miss events; notices are
/// only useful while fresh.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers. Dropped silently without subscribers.
    pub fn emit(&self, event: EditorEvent, document: Option<&DocumentRef>) {
        let envelope = EventEnvelope::new(event, document.cloned());
        tracing::debug!(
            event_type = %envelope.event_type,
            event_id = %envelope.event_id,
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(envelope);
    }

    /// Subscribe to enveloped events.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_emit_subscribe() {
        let bus = EventBus::new(32);
        let mut rx = bus.subscribe();
        let doc = DocumentRef::new("works", "acme");

        bus.emit(
            EditorEvent::SubmitFailed {
                message: "nope".to_string(),
            },
            Some(&doc),
        );

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.event_type, "document.submit_failed");
        assert_eq!(envelope.payload_version, 1);
        assert_eq!(envelope.document, Some(doc));
        assert!(envelope.payload.is_user_visible());
    }

    #[tokio::test]
    async fn test_event_bus_multiple_subscribers() {
        let bus = EventBus::new(32);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(EditorEvent::Submitted, None);

        assert_eq!(rx1.recv().await.unwrap().payload, EditorEvent::Submitted);
        assert_eq!(rx2.recv().await.unwrap().payload, EditorEvent::Submitted);
    }

    #[test]
    fn test_event_bus_no_subscribers_ok() {
        let bus = EventBus::new(4);
        bus.emit(EditorEvent::Submitted, None);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = EditorEvent::MutationSkipped {
            key: "gallery".to_string(),
            reason: "index 4 out of bounds (len 2)".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "MutationSkipped");
        assert_eq!(json["key"], "gallery");
        assert!(!event.is_user_visible());
    }
}

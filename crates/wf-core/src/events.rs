//! Batch event system.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring-buffer of recent events so that late subscribers can catch up.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::ids::{BatchId, SourceId};

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

// ---------------------------------------------------------------------------
// EventPayload
// ---------------------------------------------------------------------------

/// Payload describing what happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    // -- Batch lifecycle -----------------------------------------------------
    BatchStarted {
        batch_id: BatchId,
        sources: usize,
        presets: usize,
    },
    BatchFinished {
        batch_id: BatchId,
        completed: usize,
        failed: usize,
        cancelled: usize,
    },
    BatchAborted {
        batch_id: BatchId,
        error: String,
    },

    // -- Source lifecycle ----------------------------------------------------
    SourceStarted {
        source_id: SourceId,
        path: PathBuf,
    },
    SourceProgress {
        source_id: SourceId,
        preset_id: String,
        percent: u8,
    },
    SourceCompleted {
        source_id: SourceId,
        outputs: Vec<PathBuf>,
        warning: Option<String>,
    },
    SourceFailed {
        source_id: SourceId,
        error: String,
    },
    SourceProbeFailed {
        source_id: SourceId,
        path: PathBuf,
    },
    SourceCancelled {
        source_id: SourceId,
    },

    // -- Queue control -------------------------------------------------------
    QueuePaused,
    QueueResumed,
    QueueCancelled,

    // -- Composite -----------------------------------------------------------
    CompositeProgress {
        step: String,
        percent: u8,
    },
    CompositeCompleted {
        output: PathBuf,
    },
    CompositeFailed {
        error: String,
    },
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A timestamped event ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub payload: EventPayload,
}

impl Event {
    /// Create a new event with a fresh UUID and the current timestamp.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    recent: RwLock<VecDeque<Event>>,
}

impl EventBus {
    /// Create a new event bus.
    ///
    /// `capacity` controls the broadcast channel buffer size (not the ring
    /// buffer, which is always [`MAX_RECENT_EVENTS`]).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Broadcast an event to all current subscribers and store it in the
    /// ring buffer.
    pub fn broadcast(&self, payload: EventPayload) {
        let event = Event::new(payload);

        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let source_id = SourceId::new();
        bus.broadcast(EventPayload::SourceCancelled { source_id });

        let event = rx.try_recv().unwrap();
        match &event.payload {
            EventPayload::SourceCancelled { source_id: received } => {
                assert_eq!(*received, source_id)
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn recent_events_capped() {
        let bus = EventBus::new(256);
        for _ in 0..150 {
            bus.broadcast(EventPayload::QueuePaused);
        }
        assert_eq!(bus.recent_events(200).len(), MAX_RECENT_EVENTS);
    }

    #[test]
    fn recent_events_newest_first() {
        let bus = EventBus::new(16);
        for _ in 0..10 {
            bus.broadcast(EventPayload::QueuePaused);
        }
        bus.broadcast(EventPayload::QueueResumed);

        let recent = bus.recent_events(3);
        assert_eq!(recent.len(), 3);
        assert!(matches!(recent[0].payload, EventPayload::QueueResumed));
    }

    #[test]
    fn no_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        bus.broadcast(EventPayload::CompositeFailed {
            error: "test".into(),
        });
    }

    #[test]
    fn payload_is_snake_case_tagged() {
        let json = serde_json::to_value(EventPayload::SourceProgress {
            source_id: SourceId::new(),
            preset_id: "WFHD".into(),
            percent: 42,
        })
        .unwrap();
        assert_eq!(json["type"], "source_progress");
        assert_eq!(json["percent"], 42);

        let json = serde_json::to_value(EventPayload::QueueCancelled).unwrap();
        assert_eq!(json["type"], "queue_cancelled");
    }

    #[test]
    fn event_serde_roundtrip() {
        let event = Event::new(EventPayload::BatchFinished {
            batch_id: BatchId::new(),
            completed: 3,
            failed: 1,
            cancelled: 0,
        });
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, event.id);
        assert!(matches!(
            back.payload,
            EventPayload::BatchFinished { completed: 3, .. }
        ));
    }

    #[test]
    fn default_event_bus() {
        let bus = EventBus::default();
        assert!(bus.recent_events(10).is_empty());
    }
}

//! Player event bus.
//!
//! [`PlayerBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring-buffer of recent events so that observers attached after the fact
//! (and tests) can inspect what was dispatched. Every event carries an
//! optional [`EventRef`] trigger naming the event that caused it.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use tokio::sync::broadcast;

use crate::ids::{EventId, InstanceId};

/// Default number of events retained in the ring buffer.
pub const DEFAULT_HISTORY: usize = 100;

/// Names of notifications the session dispatches on its own behalf.
pub mod names {
    /// The media duration is known or changed.
    pub const DURATION_CHANGE: &str = "duration-change";
    /// The stream is ready to play.
    pub const CAN_PLAY: &str = "can-play";
    /// A terminal, typed error notification.
    pub const ERROR: &str = "error";
    /// The provider finished attaching an engine instance.
    pub const PROVIDER_SETUP: &str = "provider-setup";
}

// ---------------------------------------------------------------------------
// EventRef / EventDetail
// ---------------------------------------------------------------------------

/// Lightweight reference to a dispatched event, used as a causal trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRef {
    pub id: EventId,
    pub name: String,
}

/// Payload attached to a [`PlayerEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventDetail {
    None,
    /// Raw native payload passed through unmodified.
    Json(Value),
    /// Duration in seconds.
    Duration(f64),
    /// Description of a resolved engine constructor.
    Engine { name: String, version: Option<String> },
    /// A freshly attached engine instance.
    Instance(InstanceId),
    /// Typed error notification.
    Error {
        code: u16,
        kind: String,
        message: String,
    },
}

impl From<&crate::Error> for EventDetail {
    fn from(err: &crate::Error) -> Self {
        EventDetail::Error {
            code: err.code(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// PlayerEvent
// ---------------------------------------------------------------------------

/// A named, timestamped event dispatched on the player bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerEvent {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub detail: EventDetail,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<EventRef>,
}

impl PlayerEvent {
    /// Create a new event with a fresh id and the current timestamp.
    pub fn new(name: impl Into<String>, detail: EventDetail, trigger: Option<EventRef>) -> Self {
        Self {
            id: EventId::new(),
            timestamp: Utc::now(),
            name: name.into(),
            detail,
            trigger,
        }
    }

    /// Reference to this event, for use as a trigger of follow-up events.
    pub fn reference(&self) -> EventRef {
        EventRef {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// PlayerBus
// ---------------------------------------------------------------------------

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct PlayerBus {
    tx: broadcast::Sender<PlayerEvent>,
    recent: RwLock<VecDeque<PlayerEvent>>,
    history: usize,
}

impl PlayerBus {
    /// Create a new bus.
    ///
    /// `capacity` controls the broadcast channel buffer size; the ring buffer
    /// always holds [`DEFAULT_HISTORY`] events.
    pub fn new(capacity: usize) -> Self {
        Self::with_history(capacity, DEFAULT_HISTORY)
    }

    /// Create a new bus with an explicit ring-buffer size.
    pub fn with_history(capacity: usize, history: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(history)),
            history: history.max(1),
        }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Dispatch an event and return a reference usable as a trigger.
    pub fn dispatch(
        &self,
        name: impl Into<String>,
        detail: EventDetail,
        trigger: Option<EventRef>,
    ) -> EventRef {
        let event = PlayerEvent::new(name, detail, trigger);
        let reference = event.reference();
        tracing::trace!(event = %event.name, "dispatch");

        {
            let mut recent = self.recent.write();
            if recent.len() >= self.history {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // No subscribers is fine.
        let _ = self.tx.send(event);
        reference
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<PlayerEvent> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }

    /// Return retained events with the given name, oldest first.
    pub fn events_named(&self, name: &str) -> Vec<PlayerEvent> {
        let recent = self.recent.read();
        recent.iter().rev().filter(|e| e.name == name).cloned().collect()
    }
}

impl Default for PlayerBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for PlayerBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerBus")
            .field("subscribers", &self.tx.receiver_count())
            .field("retained", &self.recent.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_and_receive() {
        let bus = PlayerBus::new(16);
        let mut rx = bus.subscribe();

        bus.dispatch(names::CAN_PLAY, EventDetail::None, None);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.name, "can-play");
        assert_eq!(event.detail, EventDetail::None);
    }

    #[test]
    fn trigger_threads_through() {
        let bus = PlayerBus::new(16);
        let cause = bus.dispatch("stream-initialized", EventDetail::Json(serde_json::json!({})), None);
        bus.dispatch(names::DURATION_CHANGE, EventDetail::Duration(12.5), Some(cause.clone()));

        let events = bus.events_named(names::DURATION_CHANGE);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].trigger.as_ref(), Some(&cause));
    }

    #[test]
    fn recent_events_capped() {
        let bus = PlayerBus::with_history(256, 10);
        for _ in 0..25 {
            bus.dispatch("buffer-loaded", EventDetail::None, None);
        }
        assert_eq!(bus.recent_events(100).len(), 10);
    }

    #[test]
    fn recent_events_newest_first() {
        let bus = PlayerBus::new(16);
        bus.dispatch("first", EventDetail::None, None);
        bus.dispatch("second", EventDetail::None, None);
        let recent = bus.recent_events(1);
        assert_eq!(recent[0].name, "second");
    }

    #[test]
    fn no_subscribers_does_not_panic() {
        let bus = PlayerBus::new(1);
        bus.dispatch(names::ERROR, EventDetail::None, None);
        bus.dispatch(names::ERROR, EventDetail::None, None);
    }

    #[test]
    fn error_detail_from_error() {
        let err = crate::Error::engine_load("missing global");
        let detail = EventDetail::from(&err);
        assert_eq!(
            detail,
            EventDetail::Error {
                code: 4,
                kind: "engine-load".into(),
                message: "Engine load error: missing global".into(),
            }
        );
    }

    #[test]
    fn event_serde_roundtrip() {
        let event = PlayerEvent::new(
            "quality-change-rendered",
            EventDetail::Json(serde_json::json!({"newQuality": 2})),
            None,
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: PlayerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, event.id);
        assert_eq!(back.detail, event.detail);
    }
}

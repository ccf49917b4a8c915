//! In-process event bus on a `tokio::sync::broadcast` channel.
//!
//! Share one [`EventBus`] via `Arc`. Publishing never blocks and never fails;
//! subscribers that fall behind see `RecvError::Lagged` and skip ahead.

use chrono::{DateTime, Utc};
use sentinel_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Envelope for everything published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// Dot-separated name, e.g. `"security.token_reuse"`.
    pub event_type: String,
    /// The user the event is about, if any.
    pub user_id: Option<DbId>,
    /// Event-specific data.
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    /// An event with no user and an empty object payload.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn for_user(mut self, user_id: DbId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Whether `event_type` is inside the dot-separated `namespace`.
    pub fn in_namespace(&self, namespace: &str) -> bool {
        self.event_type
            .strip_prefix(namespace)
            .is_some_and(|rest| rest.starts_with('.'))
    }
}

/// Broadcast buffer size; older events are dropped for lagging receivers.
const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out hub: every subscriber receives every event published after it
/// subscribed.
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers and return how many there were.
    /// With none the event is simply dropped.
    pub fn publish(&self, event: PlatformEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

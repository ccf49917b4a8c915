//! Security events and the security-log subscriber.
//!
//! A [`SecurityBreachEvent`] travels over the bus as a [`PlatformEvent`]
//! whose `event_type` is `security.<kind>`, with the breach fields in the
//! payload. It is published, never persisted by this service.

use chrono::{DateTime, Utc};
use sentinel_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::bus::PlatformEvent;

/// Namespace shared by every security event type.
pub const SECURITY_NAMESPACE: &str = "security";

/// Kind of detected breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachKind {
    /// An already-rotated or revoked rotation token was presented again.
    TokenReuse,
}

impl BreachKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BreachKind::TokenReuse => "token_reuse",
        }
    }
}

/// A detected credential breach for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityBreachEvent {
    #[serde(rename = "type")]
    pub kind: BreachKind,
    pub user_id: DbId,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl SecurityBreachEvent {
    pub fn token_reuse(user_id: DbId, message: impl Into<String>) -> Self {
        Self {
            kind: BreachKind::TokenReuse,
            user_id,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Bus event type, e.g. `security.token_reuse`.
    pub fn event_type(&self) -> String {
        format!("{SECURITY_NAMESPACE}.{}", self.kind.as_str())
    }

    /// Recover a breach event from a bus envelope, if it is one.
    pub fn from_platform_event(event: &PlatformEvent) -> Option<Self> {
        if !event.in_namespace(SECURITY_NAMESPACE) {
            return None;
        }
        serde_json::from_value(event.payload.clone()).ok()
    }
}

impl From<SecurityBreachEvent> for PlatformEvent {
    fn from(breach: SecurityBreachEvent) -> Self {
        let mut event = PlatformEvent::new(breach.event_type())
            .for_user(breach.user_id)
            .with_payload(serde_json::to_value(&breach).unwrap_or_default());
        event.timestamp = breach.timestamp;
        event
    }
}

/// Background subscriber that writes every security event to the log.
pub struct SecurityLog;

impl SecurityLog {
    /// Run the logging loop until the bus is dropped.
    pub async fn run(mut receiver: broadcast::Receiver<PlatformEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Some(breach) = SecurityBreachEvent::from_platform_event(&event) {
                        tracing::warn!(
                            event_type = %event.event_type,
                            user_id = breach.user_id,
                            message = %breach.message,
                            "Security breach event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Security log lagged, some events were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, security log shutting down");
                    break;
                }
            }
        }
    }
}

//! Account-wide response to detected rotation-token reuse.
//!
//! A reused rotation token means the token family may be in an attacker's
//! hands, and any branch left alive would keep them signed in. The responder
//! therefore revokes every session of the user, not just the presented
//! family, and announces the breach on the event bus. Each step is attempted
//! even if an earlier one fails.

use std::sync::Arc;

use sentinel_core::types::DbId;
use sentinel_db::TokenLedger;
use sentinel_events::{EventBus, SecurityBreachEvent};

/// What a breach response actually achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreachReport {
    pub user_id: DbId,
    /// Sessions revoked, or `None` if the bulk revoke failed.
    pub revoked: Option<u64>,
    /// Subscribers that received the breach event.
    pub subscribers_notified: usize,
}

#[derive(Clone)]
pub struct BreachResponder {
    ledger: Arc<dyn TokenLedger>,
    event_bus: Arc<EventBus>,
}

impl BreachResponder {
    pub fn new(ledger: Arc<dyn TokenLedger>, event_bus: Arc<EventBus>) -> Self {
        Self { ledger, event_bus }
    }

    /// Revoke all of `user_id`'s sessions and publish a token-reuse event.
    pub async fn respond(&self, user_id: DbId, message: &str) -> BreachReport {
        let revoked = match self.ledger.revoke_all_for_user(user_id).await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::error!(user_id, error = %e, "Breach response: revoke-all failed");
                None
            }
        };

        let subscribers_notified = self
            .event_bus
            .publish(SecurityBreachEvent::token_reuse(user_id, message).into());

        tracing::warn!(
            user_id,
            revoked = ?revoked,
            subscribers_notified,
            "Breach response: sessions revoked after token reuse"
        );

        BreachReport {
            user_id,
            revoked,
            subscribers_notified,
        }
    }
}

#[cfg(test)]
mod tests {
    use sentinel_core::device::DeviceInfo;
    use sentinel_core::hashing::hash_rotation_token;
    use sentinel_db::models::rotation_token::NewRotationToken;
    use sentinel_db::MemoryTokenLedger;

    use super::*;

    #[tokio::test]
    async fn revokes_everything_and_publishes() {
        let ledger = Arc::new(MemoryTokenLedger::new());
        for raw in ["a", "b", "c"] {
            let input = NewRotationToken::new(4, hash_rotation_token(raw), DeviceInfo::default());
            ledger.insert(&input).await.unwrap();
        }
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();

        let responder = BreachResponder::new(ledger.clone(), bus.clone());
        let report = responder.respond(4, "Rotation token reused").await;

        assert_eq!(report.revoked, Some(3));
        assert_eq!(report.subscribers_notified, 1);
        assert!(ledger.list_active_for_user(4).await.unwrap().is_empty());

        let event = rx.recv().await.expect("breach event");
        let breach = SecurityBreachEvent::from_platform_event(&event).expect("security event");
        assert_eq!(breach.user_id, 4);
        assert_eq!(breach.message, "Rotation token reused");
    }
}

//! Per-user concurrent session cap.

use std::sync::Arc;

use sentinel_core::types::DbId;
use sentinel_db::{LedgerError, TokenLedger};

/// Revokes least-recently-used sessions beyond a per-user cap.
///
/// Runs after every successful registration and rotation. Breach response
/// does not use it; revoke-all already covers that case.
#[derive(Clone)]
pub struct SessionLimiter {
    ledger: Arc<dyn TokenLedger>,
}

impl SessionLimiter {
    pub fn new(ledger: Arc<dyn TokenLedger>) -> Self {
        Self { ledger }
    }

    /// Trim `user_id` down to `max_sessions` active sessions.
    ///
    /// Returns how many sessions this call revoked.
    pub async fn enforce_limit(&self, user_id: DbId, max_sessions: usize) -> Result<u64, LedgerError> {
        // Newest first, so everything past `max_sessions` is the LRU tail.
        let active = self.ledger.list_active_for_user(user_id).await?;
        if active.len() <= max_sessions {
            return Ok(0);
        }

        let mut revoked = 0;
        for stale in &active[max_sessions..] {
            if self.ledger.revoke(stale.id).await? {
                revoked += 1;
            }
        }

        tracing::info!(
            user_id,
            max_sessions,
            active = active.len(),
            revoked,
            "Session limit enforced"
        );
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use sentinel_core::device::DeviceInfo;
    use sentinel_core::hashing::hash_rotation_token;
    use sentinel_db::models::rotation_token::NewRotationToken;
    use sentinel_db::MemoryTokenLedger;

    use super::*;

    async fn seed(ledger: &MemoryTokenLedger, user_id: DbId, count: usize) -> Vec<DbId> {
        let mut ids = Vec::new();
        for i in 0..count {
            let input = NewRotationToken::new(
                user_id,
                hash_rotation_token(&format!("u{user_id}-t{i}")),
                DeviceInfo::new("ua", format!("device-{i}")),
            );
            ids.push(ledger.insert(&input).await.unwrap().id);
        }
        ids
    }

    #[tokio::test]
    async fn under_limit_is_untouched() {
        let ledger = Arc::new(MemoryTokenLedger::new());
        seed(&ledger, 1, 3).await;

        let limiter = SessionLimiter::new(ledger.clone());
        assert_eq!(limiter.enforce_limit(1, 3).await.unwrap(), 0);
        assert_eq!(ledger.list_active_for_user(1).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn over_limit_revokes_least_recently_used() {
        let ledger = Arc::new(MemoryTokenLedger::new());
        let ids = seed(&ledger, 1, 4).await;

        // The oldest session was used recently, so the second one is LRU.
        ledger.touch(ids[0]).await.unwrap();

        let limiter = SessionLimiter::new(ledger.clone());
        assert_eq!(limiter.enforce_limit(1, 3).await.unwrap(), 1);

        assert!(ledger.get(ids[1]).await.unwrap().is_revoked);
        assert!(!ledger.get(ids[0]).await.unwrap().is_revoked);
        assert_eq!(ledger.list_active_for_user(1).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn other_users_are_not_counted() {
        let ledger = Arc::new(MemoryTokenLedger::new());
        seed(&ledger, 1, 2).await;
        seed(&ledger, 2, 5).await;

        let limiter = SessionLimiter::new(ledger.clone());
        assert_eq!(limiter.enforce_limit(1, 2).await.unwrap(), 0);
        assert_eq!(ledger.list_active_for_user(2).await.unwrap().len(), 5);
    }
}

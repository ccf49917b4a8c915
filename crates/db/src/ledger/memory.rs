use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use sentinel_core::types::DbId;
use tokio::sync::RwLock;

use super::{LedgerError, RotateOutcome, TokenLedger, TokenLookup};
use crate::models::rotation_token::{NewRotationToken, RotationToken};

/// In-process [`TokenLedger`].
///
/// All mutations run under one write lock, so `rotate` is atomic with
/// respect to every other ledger call in the process.
#[derive(Default)]
pub struct MemoryTokenLedger {
    state: RwLock<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    next_id: DbId,
    rows: BTreeMap<DbId, RotationToken>,
    by_hash: HashMap<String, DbId>,
}

impl LedgerState {
    fn insert(&mut self, input: &NewRotationToken) -> Result<RotationToken, LedgerError> {
        let now = Utc::now();

        if let Some(&existing_id) = self.by_hash.get(&input.token_hash) {
            match self.rows.get(&existing_id) {
                Some(existing) if !existing.is_expired_at(now) => {
                    return Err(LedgerError::ConstraintViolation(
                        "uq_rotation_tokens_token_hash".into(),
                    ));
                }
                _ => {
                    self.rows.remove(&existing_id);
                }
            }
        }

        self.next_id += 1;
        let token = RotationToken {
            id: self.next_id,
            user_id: input.user_id,
            token_hash: input.token_hash.clone(),
            agent_string: input.device_info.agent_string.clone(),
            stable_device_id: input.device_info.stable_device_id.clone(),
            issued_at: now,
            expires_at: input.expires_at,
            is_revoked: false,
            revoked_at: None,
            last_used_at: input.last_used_at,
            parent_token_hash: input.parent_token_hash.clone(),
        };
        self.by_hash.insert(token.token_hash.clone(), token.id);
        self.rows.insert(token.id, token.clone());
        Ok(token)
    }

    fn revoke(&mut self, id: DbId) -> bool {
        match self.rows.get_mut(&id) {
            Some(row) if !row.is_revoked => {
                row.is_revoked = true;
                row.revoked_at = Some(Utc::now());
                true
            }
            _ => false,
        }
    }

    fn remove(&mut self, id: DbId) {
        if let Some(row) = self.rows.remove(&id) {
            self.by_hash.remove(&row.token_hash);
        }
    }
}

impl MemoryTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total rows held, including revoked and expired ones.
    pub async fn len(&self) -> usize {
        self.state.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Fetch a row by id in any state.
    pub async fn get(&self, id: DbId) -> Option<RotationToken> {
        self.state.read().await.rows.get(&id).cloned()
    }
}

#[async_trait]
impl TokenLedger for MemoryTokenLedger {
    async fn insert(&self, input: &NewRotationToken) -> Result<RotationToken, LedgerError> {
        self.state.write().await.insert(input)
    }

    async fn lookup(&self, token_hash: &str) -> Result<TokenLookup, LedgerError> {
        let state = self.state.read().await;
        let record = state
            .by_hash
            .get(token_hash)
            .and_then(|id| state.rows.get(id))
            .cloned();
        Ok(TokenLookup::classify(record, Utc::now()))
    }

    async fn touch(&self, id: DbId) -> Result<(), LedgerError> {
        if let Some(row) = self.state.write().await.rows.get_mut(&id) {
            row.last_used_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn revoke(&self, id: DbId) -> Result<bool, LedgerError> {
        Ok(self.state.write().await.revoke(id))
    }

    async fn revoke_all_for_user(&self, user_id: DbId) -> Result<u64, LedgerError> {
        let mut state = self.state.write().await;
        let ids: Vec<DbId> = state
            .rows
            .values()
            .filter(|r| r.user_id == user_id && !r.is_revoked)
            .map(|r| r.id)
            .collect();
        Ok(ids.into_iter().filter(|&id| state.revoke(id)).count() as u64)
    }

    async fn list_active_for_user(&self, user_id: DbId) -> Result<Vec<RotationToken>, LedgerError> {
        let now = Utc::now();
        let state = self.state.read().await;
        let mut active: Vec<RotationToken> = state
            .rows
            .values()
            .filter(|r| r.user_id == user_id && r.is_active_at(now))
            .cloned()
            .collect();
        active.sort_by(|a, b| {
            b.last_activity()
                .cmp(&a.last_activity())
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(active)
    }

    async fn rotate(
        &self,
        old_id: DbId,
        replacement: &NewRotationToken,
    ) -> Result<RotateOutcome, LedgerError> {
        let mut state = self.state.write().await;

        let old_is_live = state.rows.get(&old_id).is_some_and(|r| !r.is_revoked);
        if !old_is_live {
            tracing::debug!(old_id, "Rotation lost the conditional revoke");
            return Ok(RotateOutcome::AlreadyRevoked);
        }

        let token = state.insert(replacement)?;
        state.revoke(old_id);
        Ok(RotateOutcome::Committed(token))
    }

    async fn purge_expired(&self) -> Result<u64, LedgerError> {
        let now = Utc::now();
        let mut state = self.state.write().await;
        let expired: Vec<DbId> = state
            .rows
            .values()
            .filter(|r| r.is_expired_at(now))
            .map(|r| r.id)
            .collect();
        for &id in &expired {
            state.remove(id);
        }
        Ok(expired.len() as u64)
    }

    async fn health_check(&self) -> Result<(), LedgerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use sentinel_core::device::DeviceInfo;
    use sentinel_core::hashing::hash_rotation_token;

    use super::*;

    fn new_token(user_id: DbId, raw: &str) -> NewRotationToken {
        NewRotationToken::new(user_id, hash_rotation_token(raw), DeviceInfo::new("ua", "dev"))
    }

    #[tokio::test]
    async fn insert_then_find_active() {
        let ledger = MemoryTokenLedger::new();
        let created = ledger.insert(&new_token(1, "A")).await.unwrap();

        let found = ledger.find_active(&hash_rotation_token("A")).await.unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.device_info(), DeviceInfo::new("ua", "dev"));
    }

    #[tokio::test]
    async fn duplicate_live_hash_is_rejected() {
        let ledger = MemoryTokenLedger::new();
        ledger.insert(&new_token(1, "A")).await.unwrap();

        let err = ledger.insert(&new_token(2, "A")).await.unwrap_err();
        assert_matches!(err, LedgerError::ConstraintViolation(_));
    }

    #[tokio::test]
    async fn revoked_live_hash_still_blocks_reinsert() {
        let ledger = MemoryTokenLedger::new();
        let created = ledger.insert(&new_token(1, "A")).await.unwrap();
        ledger.revoke(created.id).await.unwrap();

        let err = ledger.insert(&new_token(1, "A")).await.unwrap_err();
        assert_matches!(err, LedgerError::ConstraintViolation(_));
    }

    #[tokio::test]
    async fn expired_hash_can_be_reused() {
        let ledger = MemoryTokenLedger::new();
        let stale = new_token(1, "A").with_expires_at(Utc::now() - chrono::Duration::seconds(1));
        ledger.insert(&stale).await.unwrap();

        let fresh = ledger.insert(&new_token(1, "A")).await.unwrap();
        assert_eq!(ledger.len().await, 1);
        assert_eq!(
            ledger.find_active(&hash_rotation_token("A")).await.unwrap().id,
            fresh.id
        );
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let ledger = MemoryTokenLedger::new();
        let created = ledger.insert(&new_token(1, "A")).await.unwrap();

        assert!(ledger.revoke(created.id).await.unwrap());
        assert!(!ledger.revoke(created.id).await.unwrap());
        assert!(!ledger.revoke(999).await.unwrap());

        let lookup = ledger.lookup(&created.token_hash).await.unwrap();
        assert_matches!(lookup, TokenLookup::Revoked(r) if r.revoked_at.is_some());
        assert_matches!(
            ledger.find_active(&created.token_hash).await,
            Err(LedgerError::NotFound)
        );
    }

    #[tokio::test]
    async fn expired_record_is_hidden_then_purged() {
        let ledger = MemoryTokenLedger::new();
        let stale = new_token(1, "old").with_expires_at(Utc::now() - chrono::Duration::seconds(1));
        ledger.insert(&stale).await.unwrap();
        ledger.insert(&new_token(1, "live")).await.unwrap();

        assert_matches!(
            ledger.find_active(&hash_rotation_token("old")).await,
            Err(LedgerError::NotFound)
        );
        assert_matches!(
            ledger.lookup(&hash_rotation_token("old")).await.unwrap(),
            TokenLookup::Expired(_)
        );

        assert_eq!(ledger.purge_expired().await.unwrap(), 1);
        assert_eq!(ledger.purge_expired().await.unwrap(), 0);
        assert_eq!(
            ledger.lookup(&hash_rotation_token("old")).await.unwrap(),
            TokenLookup::Missing
        );
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn rotate_inserts_then_revokes_once() {
        let ledger = MemoryTokenLedger::new();
        let old = ledger.insert(&new_token(1, "A")).await.unwrap();

        let replacement = new_token(1, "B").with_parent(old.token_hash.clone());
        let outcome = ledger.rotate(old.id, &replacement).await.unwrap();
        let new = assert_matches!(outcome, RotateOutcome::Committed(t) => t);
        assert_eq!(new.parent_token_hash.as_deref(), Some(old.token_hash.as_str()));
        assert!(ledger.get(old.id).await.unwrap().is_revoked);

        let again = ledger
            .rotate(old.id, &new_token(1, "C"))
            .await
            .unwrap();
        assert_eq!(again, RotateOutcome::AlreadyRevoked);
        assert_matches!(
            ledger.lookup(&hash_rotation_token("C")).await.unwrap(),
            TokenLookup::Missing
        );
    }

    #[tokio::test]
    async fn list_orders_by_last_activity_and_skips_inactive() {
        let ledger = MemoryTokenLedger::new();
        let first = ledger.insert(&new_token(1, "A")).await.unwrap();
        let second = ledger.insert(&new_token(1, "B")).await.unwrap();
        let revoked = ledger.insert(&new_token(1, "C")).await.unwrap();
        ledger.insert(&new_token(2, "D")).await.unwrap();
        ledger.revoke(revoked.id).await.unwrap();

        ledger.touch(first.id).await.unwrap();

        let ids: Vec<DbId> = ledger
            .list_active_for_user(1)
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn revoke_all_only_touches_one_user() {
        let ledger = MemoryTokenLedger::new();
        ledger.insert(&new_token(1, "A")).await.unwrap();
        ledger.insert(&new_token(1, "B")).await.unwrap();
        ledger.insert(&new_token(2, "C")).await.unwrap();

        assert_eq!(ledger.revoke_all_for_user(1).await.unwrap(), 2);
        assert_eq!(ledger.revoke_all_for_user(1).await.unwrap(), 0);
        assert!(ledger.list_active_for_user(1).await.unwrap().is_empty());
        assert_eq!(ledger.list_active_for_user(2).await.unwrap().len(), 1);
    }
}

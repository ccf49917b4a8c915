//! Rotation-token ledger row and DTOs.

use chrono::Utc;
use serde::Serialize;
use sentinel_core::device::DeviceInfo;
use sentinel_core::session::SessionSummary;
use sentinel_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// Default lifetime of a rotation token when the caller supplies none.
pub const DEFAULT_ROTATION_TOKEN_TTL_DAYS: i64 = 7;

/// A row from the `rotation_tokens` table.
///
/// `device_info` is stored flattened into `agent_string` and
/// `stable_device_id`; use [`RotationToken::device_info`] to rebuild it.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct RotationToken {
    pub id: DbId,
    pub user_id: DbId,
    pub token_hash: String,
    pub agent_string: String,
    pub stable_device_id: String,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
    pub is_revoked: bool,
    pub revoked_at: Option<Timestamp>,
    pub last_used_at: Option<Timestamp>,
    /// Hash of the token this one replaced. Forensic only.
    pub parent_token_hash: Option<String>,
}

impl RotationToken {
    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo::new(self.agent_string.clone(), self.stable_device_id.clone())
    }

    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }

    /// Whether this row is a currently valid rotation credential.
    pub fn is_active_at(&self, now: Timestamp) -> bool {
        !self.is_revoked && !self.is_expired_at(now)
    }

    /// Most recent activity, used for least-recently-used ordering.
    pub fn last_activity(&self) -> Timestamp {
        self.last_used_at.unwrap_or(self.issued_at)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            device_info: self.device_info(),
            issued_at: self.issued_at,
            last_used_at: self.last_used_at,
        }
    }
}

/// DTO for inserting a new rotation token.
#[derive(Debug, Clone)]
pub struct NewRotationToken {
    pub user_id: DbId,
    pub token_hash: String,
    pub device_info: DeviceInfo,
    pub expires_at: Timestamp,
    pub last_used_at: Option<Timestamp>,
    pub parent_token_hash: Option<String>,
}

impl NewRotationToken {
    /// A root token (no parent) expiring after the default TTL.
    pub fn new(user_id: DbId, token_hash: impl Into<String>, device_info: DeviceInfo) -> Self {
        Self {
            user_id,
            token_hash: token_hash.into(),
            device_info,
            expires_at: Utc::now() + chrono::Duration::days(DEFAULT_ROTATION_TOKEN_TTL_DAYS),
            last_used_at: None,
            parent_token_hash: None,
        }
    }

    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.expires_at = Utc::now() + ttl;
        self
    }

    pub fn with_expires_at(mut self, expires_at: Timestamp) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// Link this token to the one it replaces.
    pub fn with_parent(mut self, parent_token_hash: impl Into<String>) -> Self {
        self.parent_token_hash = Some(parent_token_hash.into());
        self
    }

    pub fn used_at(mut self, at: Timestamp) -> Self {
        self.last_used_at = Some(at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(is_revoked: bool, expires_in: chrono::Duration) -> RotationToken {
        let now = Utc::now();
        RotationToken {
            id: 1,
            user_id: 7,
            token_hash: "h".repeat(64),
            agent_string: "ua".into(),
            stable_device_id: "dev-1".into(),
            issued_at: now,
            expires_at: now + expires_in,
            is_revoked,
            revoked_at: None,
            last_used_at: None,
            parent_token_hash: None,
        }
    }

    #[test]
    fn active_requires_unrevoked_and_unexpired() {
        let now = Utc::now();
        assert!(row(false, chrono::Duration::hours(1)).is_active_at(now));
        assert!(!row(true, chrono::Duration::hours(1)).is_active_at(now));
        assert!(!row(false, chrono::Duration::hours(-1)).is_active_at(now));
    }

    #[test]
    fn last_activity_falls_back_to_issue_time() {
        let mut token = row(false, chrono::Duration::hours(1));
        assert_eq!(token.last_activity(), token.issued_at);

        let later = token.issued_at + chrono::Duration::minutes(5);
        token.last_used_at = Some(later);
        assert_eq!(token.last_activity(), later);
    }

    #[test]
    fn new_token_defaults_to_seven_day_ttl() {
        let input = NewRotationToken::new(1, "abc", DeviceInfo::default());
        let ttl = input.expires_at - Utc::now();
        assert!(ttl > chrono::Duration::days(6));
        assert!(ttl <= chrono::Duration::days(7));
        assert!(input.parent_token_hash.is_none());
    }
}

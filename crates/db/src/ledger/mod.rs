//! The rotation-token ledger.
//!
//! [`TokenLedger`] is the sole mutator of rotation-token rows. Every other
//! component reads through it or asks it to mutate. Two implementations
//! ship with the crate:
//!
//! - [`PgTokenLedger`] -- PostgreSQL via [`RotationTokenRepo`](crate::repositories::RotationTokenRepo).
//! - [`MemoryTokenLedger`] -- in-process map, for tests and single-node use.
//!
//! Cross-process correctness of rotation rests on [`TokenLedger::rotate`]:
//! the old row is revoked only if it was still unrevoked at that moment, and
//! the insert of its replacement is undone otherwise.

mod memory;
mod postgres;

use async_trait::async_trait;
use sentinel_core::types::{DbId, Timestamp};

use crate::models::rotation_token::{NewRotationToken, RotationToken};

pub use memory::MemoryTokenLedger;
pub use postgres::PgTokenLedger;

/// Errors surfaced by a [`TokenLedger`].
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// No active record. Also covers revoked and expired rows.
    #[error("Rotation token not found")]
    NotFound,

    /// The hash collides with a live record.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Internal classification of a presented token hash.
///
/// Kept for logging and for resolving the owning user on a stale
/// presentation. Callers must fold every non-`Valid` state into the same
/// public response so the ledger's contents are not observable from outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenLookup {
    Valid(RotationToken),
    Expired(RotationToken),
    Revoked(RotationToken),
    Missing,
}

impl TokenLookup {
    /// Classify a row (or its absence) at `now`. Revocation wins over expiry.
    pub fn classify(record: Option<RotationToken>, now: Timestamp) -> Self {
        match record {
            None => TokenLookup::Missing,
            Some(r) if r.is_revoked => TokenLookup::Revoked(r),
            Some(r) if r.is_expired_at(now) => TokenLookup::Expired(r),
            Some(r) => TokenLookup::Valid(r),
        }
    }

    /// Short state name for structured logs.
    pub fn state(&self) -> &'static str {
        match self {
            TokenLookup::Valid(_) => "valid",
            TokenLookup::Expired(_) => "expired",
            TokenLookup::Revoked(_) => "revoked",
            TokenLookup::Missing => "missing",
        }
    }

    pub fn record(&self) -> Option<&RotationToken> {
        match self {
            TokenLookup::Valid(r) | TokenLookup::Expired(r) | TokenLookup::Revoked(r) => Some(r),
            TokenLookup::Missing => None,
        }
    }
}

/// Outcome of [`TokenLedger::rotate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotateOutcome {
    /// Replacement inserted and old token revoked.
    Committed(RotationToken),
    /// The old token was already revoked; nothing was written.
    AlreadyRevoked,
}

/// Durable store of rotation-token records.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Insert a new record. Fails with [`LedgerError::ConstraintViolation`]
    /// when the hash belongs to a live record.
    async fn insert(&self, input: &NewRotationToken) -> Result<RotationToken, LedgerError>;

    /// Classify a hash without folding its state.
    async fn lookup(&self, token_hash: &str) -> Result<TokenLookup, LedgerError>;

    /// Return the active record for `token_hash`, or [`LedgerError::NotFound`]
    /// for missing, revoked and expired alike.
    async fn find_active(&self, token_hash: &str) -> Result<RotationToken, LedgerError> {
        match self.lookup(token_hash).await? {
            TokenLookup::Valid(record) => Ok(record),
            _ => Err(LedgerError::NotFound),
        }
    }

    /// Bump `last_used_at` to now.
    async fn touch(&self, id: DbId) -> Result<(), LedgerError>;

    /// Revoke one record. Returns `true` only when this call flipped it;
    /// revoking an already-revoked or unknown record is a no-op.
    async fn revoke(&self, id: DbId) -> Result<bool, LedgerError>;

    /// Revoke every live record for the user. Returns the count flipped.
    async fn revoke_all_for_user(&self, user_id: DbId) -> Result<u64, LedgerError>;

    /// Active records for a user ordered by last activity, newest first.
    async fn list_active_for_user(&self, user_id: DbId) -> Result<Vec<RotationToken>, LedgerError>;

    /// Insert `replacement`, then revoke `old_id` if it is still unrevoked.
    async fn rotate(
        &self,
        old_id: DbId,
        replacement: &NewRotationToken,
    ) -> Result<RotateOutcome, LedgerError>;

    /// Hard-delete expired records. Idempotent.
    async fn purge_expired(&self) -> Result<u64, LedgerError>;

    async fn health_check(&self) -> Result<(), LedgerError>;
}

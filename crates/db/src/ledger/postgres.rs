use async_trait::async_trait;
use chrono::Utc;
use sentinel_core::types::DbId;

use super::{LedgerError, RotateOutcome, TokenLedger, TokenLookup};
use crate::models::rotation_token::{NewRotationToken, RotationToken};
use crate::repositories::RotationTokenRepo;
use crate::DbPool;

/// PostgreSQL unique-violation SQLSTATE.
const UNIQUE_VIOLATION: &str = "23505";

/// [`TokenLedger`] backed by the `rotation_tokens` table.
#[derive(Clone)]
pub struct PgTokenLedger {
    pool: DbPool,
}

impl PgTokenLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Map unique-constraint violations onto [`LedgerError::ConstraintViolation`].
fn classify_sqlx_error(err: sqlx::Error) -> LedgerError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            tracing::debug!(%constraint, "Rotation token insert hit a unique constraint");
            return LedgerError::ConstraintViolation(constraint);
        }
    }
    LedgerError::Database(err)
}

#[async_trait]
impl TokenLedger for PgTokenLedger {
    async fn insert(&self, input: &NewRotationToken) -> Result<RotationToken, LedgerError> {
        RotationTokenRepo::create(&self.pool, input)
            .await
            .map_err(classify_sqlx_error)
    }

    async fn lookup(&self, token_hash: &str) -> Result<TokenLookup, LedgerError> {
        let record = RotationTokenRepo::find_by_hash(&self.pool, token_hash).await?;
        Ok(TokenLookup::classify(record, Utc::now()))
    }

    async fn find_active(&self, token_hash: &str) -> Result<RotationToken, LedgerError> {
        RotationTokenRepo::find_active_by_hash(&self.pool, token_hash)
            .await?
            .ok_or(LedgerError::NotFound)
    }

    async fn touch(&self, id: DbId) -> Result<(), LedgerError> {
        RotationTokenRepo::touch(&self.pool, id).await?;
        Ok(())
    }

    async fn revoke(&self, id: DbId) -> Result<bool, LedgerError> {
        Ok(RotationTokenRepo::revoke(&self.pool, id).await?)
    }

    async fn revoke_all_for_user(&self, user_id: DbId) -> Result<u64, LedgerError> {
        Ok(RotationTokenRepo::revoke_all_for_user(&self.pool, user_id).await?)
    }

    async fn list_active_for_user(&self, user_id: DbId) -> Result<Vec<RotationToken>, LedgerError> {
        Ok(RotationTokenRepo::list_active_for_user(&self.pool, user_id).await?)
    }

    async fn rotate(
        &self,
        old_id: DbId,
        replacement: &NewRotationToken,
    ) -> Result<RotateOutcome, LedgerError> {
        let outcome = RotationTokenRepo::rotate(&self.pool, old_id, replacement)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(match outcome {
            Some(token) => RotateOutcome::Committed(token),
            None => {
                tracing::debug!(old_id, "Rotation lost the conditional revoke; rolled back");
                RotateOutcome::AlreadyRevoked
            }
        })
    }

    async fn purge_expired(&self) -> Result<u64, LedgerError> {
        let purged = RotationTokenRepo::purge_expired(&self.pool).await?;
        if purged > 0 {
            tracing::debug!(purged, "Deleted expired rotation tokens");
        }
        Ok(purged)
    }

    async fn health_check(&self) -> Result<(), LedgerError> {
        Ok(crate::health_check(&self.pool).await?)
    }
}

//! Repository for the `rotation_tokens` table.

use sentinel_core::types::DbId;
use sqlx::PgPool;

use crate::models::rotation_token::{NewRotationToken, RotationToken};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, token_hash, agent_string, stable_device_id, issued_at, \
                       expires_at, is_revoked, revoked_at, last_used_at, parent_token_hash";

/// Provides ledger operations for rotation tokens.
pub struct RotationTokenRepo;

impl RotationTokenRepo {
    /// Insert a new rotation token, returning the created row.
    ///
    /// An expired row with the same hash is removed first so the unique
    /// index only ever binds against live rows.
    pub async fn create(pool: &PgPool, input: &NewRotationToken) -> Result<RotationToken, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let token = Self::create_inner(&mut tx, input).await?;
        tx.commit().await?;
        Ok(token)
    }

    /// Find a row by hash regardless of its revoked/expired state.
    pub async fn find_by_hash(
        pool: &PgPool,
        token_hash: &str,
    ) -> Result<Option<RotationToken>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM rotation_tokens WHERE token_hash = $1");
        sqlx::query_as::<_, RotationToken>(&query)
            .bind(token_hash)
            .fetch_optional(pool)
            .await
    }

    /// Find an active token by hash.
    ///
    /// Only returns rows that are not revoked and not expired.
    pub async fn find_active_by_hash(
        pool: &PgPool,
        token_hash: &str,
    ) -> Result<Option<RotationToken>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM rotation_tokens
             WHERE token_hash = $1
               AND is_revoked = false
               AND expires_at > NOW()"
        );
        sqlx::query_as::<_, RotationToken>(&query)
            .bind(token_hash)
            .fetch_optional(pool)
            .await
    }

    /// Record a use of the token. Returns `true` if the row exists.
    pub async fn touch(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE rotation_tokens SET last_used_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke a single token. Returns `true` only if this call flipped it.
    pub async fn revoke(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE rotation_tokens SET is_revoked = true, revoked_at = NOW()
             WHERE id = $1 AND is_revoked = false",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke all live tokens for a user. Returns the count of revoked rows.
    pub async fn revoke_all_for_user(pool: &PgPool, user_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE rotation_tokens SET is_revoked = true, revoked_at = NOW()
             WHERE user_id = $1 AND is_revoked = false",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// List active tokens for a user, most recently used first.
    pub async fn list_active_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<RotationToken>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM rotation_tokens
             WHERE user_id = $1
               AND is_revoked = false
               AND expires_at > NOW()
             ORDER BY COALESCE(last_used_at, issued_at) DESC, id DESC"
        );
        sqlx::query_as::<_, RotationToken>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Insert `replacement` and revoke `old_id` in one transaction.
    ///
    /// Returns `None` (and rolls back the insert) when `old_id` was already
    /// revoked, meaning another rotation of the same token committed first.
    pub async fn rotate(
        pool: &PgPool,
        old_id: DbId,
        replacement: &NewRotationToken,
    ) -> Result<Option<RotationToken>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let token = Self::create_inner(&mut tx, replacement).await?;

        let revoked = sqlx::query(
            "UPDATE rotation_tokens SET is_revoked = true, revoked_at = NOW()
             WHERE id = $1 AND is_revoked = false",
        )
        .bind(old_id)
        .execute(&mut *tx)
        .await?;

        if revoked.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(token))
    }

    /// Hard-delete expired rows. Returns the count of deleted rows.
    ///
    /// Revoked rows are kept until they expire so a late presentation of a
    /// rotated token is still recognised as reuse.
    pub async fn purge_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM rotation_tokens WHERE expires_at <= NOW()")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    async fn create_inner(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        input: &NewRotationToken,
    ) -> Result<RotationToken, sqlx::Error> {
        sqlx::query("DELETE FROM rotation_tokens WHERE token_hash = $1 AND expires_at <= NOW()")
            .bind(&input.token_hash)
            .execute(&mut **tx)
            .await?;

        let query = format!(
            "INSERT INTO rotation_tokens
                (user_id, token_hash, agent_string, stable_device_id, expires_at,
                 last_used_at, parent_token_hash)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RotationToken>(&query)
            .bind(input.user_id)
            .bind(&input.token_hash)
            .bind(&input.device_info.agent_string)
            .bind(&input.device_info.stable_device_id)
            .bind(input.expires_at)
            .bind(input.last_used_at)
            .bind(&input.parent_token_hash)
            .fetch_one(&mut **tx)
            .await
    }
}

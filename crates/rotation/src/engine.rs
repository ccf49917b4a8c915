//! The rotation state machine.
//!
//! ```text
//! INPUT -> HASH -> LOOKUP -+-> ROTATE          (valid record)
//!                          +-> REUSE_SUSPECTED (missing / revoked / expired)
//! ```
//!
//! On ROTATE the engine asks the issuer for a new pair, then writes the
//! replacement before revoking the presented token. A crash between the two
//! leaves both tokens briefly valid; the next presentation of the old one is
//! caught as reuse. It never leaves the user with zero valid tokens.
//!
//! Concurrent rotations of the same raw token inside this process are
//! coalesced by a [`SingleFlight`] keyed on the token hash, so two tabs
//! refreshing at once share one rotation instead of tripping reuse
//! detection against each other. A flight runs on its own task and leaves
//! the table as soon as it finishes, even if the request that started it was
//! dropped; a later presentation of the same token is looked up afresh.
//! Across processes the ledger's conditional revoke decides the winner.
//!
//! Nothing is written to the ledger before the issuer succeeds.

use std::sync::Arc;

use chrono::Utc;
use sentinel_core::device::DeviceInfo;
use sentinel_core::hashing::{hash_rotation_token, log_prefix};
use sentinel_core::session::RotatedCredentials;
use sentinel_core::single_flight::SingleFlight;
use sentinel_core::types::DbId;
use sentinel_core::validation::{validate_device_info, validate_raw_token};
use sentinel_db::models::rotation_token::NewRotationToken;
use sentinel_db::{LedgerError, RotateOutcome, TokenLedger, TokenLookup};

use crate::breach::BreachResponder;
use crate::config::RotationConfig;
use crate::error::RotationError;
use crate::issuer::{CredentialIssuer, IssueRequest, IssuedCredentials};
use crate::limiter::SessionLimiter;

type RotationResult = Result<RotatedCredentials, RotationError>;

/// Message attached to breach events raised by the engine.
const REUSE_MESSAGE: &str =
    "A previously used session token was presented again. All sessions have been signed out.";

/// Validates presented rotation tokens and exchanges them for new ones.
#[derive(Clone)]
pub struct RotationEngine {
    ledger: Arc<dyn TokenLedger>,
    issuer: Arc<dyn CredentialIssuer>,
    limiter: SessionLimiter,
    responder: BreachResponder,
    config: RotationConfig,
    flights: SingleFlight<String, RotationResult>,
}

impl RotationEngine {
    pub fn new(
        ledger: Arc<dyn TokenLedger>,
        issuer: Arc<dyn CredentialIssuer>,
        limiter: SessionLimiter,
        responder: BreachResponder,
        config: RotationConfig,
    ) -> Self {
        Self {
            ledger,
            issuer,
            limiter,
            responder,
            config,
            flights: SingleFlight::new(),
        }
    }

    /// Exchange `raw_token` for a new credential pair.
    ///
    /// Any token that is not currently valid yields
    /// [`RotationError::TokenReuseDetected`]; when its owner can be resolved
    /// the owner's sessions are all revoked before returning.
    pub async fn rotate(&self, raw_token: &str, device_info: DeviceInfo) -> RotationResult {
        validate_raw_token(raw_token).map_err(|e| RotationError::InvalidToken(e.to_string()))?;
        validate_device_info(&device_info)?;

        let token_hash = hash_rotation_token(raw_token);
        let engine = self.clone();
        let flight_hash = token_hash.clone();

        let flight = self
            .flights
            .run(token_hash, move || async move {
                engine.rotate_hashed(flight_hash, device_info).await
            })
            .await;

        flight.unwrap_or_else(|aborted| {
            tracing::error!(error = %aborted, "Rotation task did not complete");
            Err(RotationError::Storage(aborted.to_string()))
        })
    }

    async fn rotate_hashed(&self, token_hash: String, device_info: DeviceInfo) -> RotationResult {
        let lookup = self.ledger.lookup(&token_hash).await?;
        let current = match lookup {
            TokenLookup::Valid(record) => record,
            stale => return Err(self.reuse_suspected(&token_hash, &stale).await),
        };

        let issued = self.issue(current.user_id, &device_info).await?;

        let replacement = NewRotationToken::new(
            current.user_id,
            hash_rotation_token(&issued.rotation_token),
            device_info,
        )
        .with_expires_at(issued.rotation_expires_at)
        .with_parent(token_hash.clone())
        .used_at(Utc::now());

        let new_record = match self.ledger.rotate(current.id, &replacement).await {
            Ok(RotateOutcome::Committed(record)) => record,
            Ok(RotateOutcome::AlreadyRevoked) => {
                // Another process rotated this token between our lookup and
                // our revoke. Only one rotation may win; ours is reuse.
                let lost = TokenLookup::Revoked(current);
                return Err(self.reuse_suspected(&token_hash, &lost).await);
            }
            Err(LedgerError::ConstraintViolation(constraint)) => {
                return Err(RotationError::IssuerFailure(format!(
                    "issued rotation token collides with a live token ({constraint})"
                )));
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            user_id = new_record.user_id,
            old_token_id = current.id,
            new_token_id = new_record.id,
            "Rotation token rotated"
        );

        self.after_commit(new_record.user_id).await;

        Ok(RotatedCredentials {
            access_token: issued.access_token,
            rotation_token: issued.rotation_token,
            expires_in: issued.expires_in,
            expires_at: new_record.expires_at,
            user: issued.user,
        })
    }

    /// Call the issuer under the configured timeout.
    async fn issue(
        &self,
        user_id: DbId,
        device_info: &DeviceInfo,
    ) -> Result<IssuedCredentials, RotationError> {
        let request = IssueRequest {
            user_id,
            device_info: device_info.clone(),
        };

        match tokio::time::timeout(self.config.issuer_timeout, self.issuer.issue(&request)).await {
            Ok(Ok(issued)) => Ok(issued),
            Ok(Err(e)) => {
                tracing::error!(user_id, error = %e, "Credential issuer failed; token left valid");
                Err(RotationError::IssuerFailure(e.to_string()))
            }
            Err(_) => {
                tracing::warn!(
                    user_id,
                    timeout_ms = self.config.issuer_timeout.as_millis() as u64,
                    "Credential issuer timed out; token left valid"
                );
                Err(RotationError::IssuerFailure(format!(
                    "issuer timed out after {:?}",
                    self.config.issuer_timeout
                )))
            }
        }
    }

    /// REUSE_SUSPECTED: cascade when the owner is known, reject either way.
    async fn reuse_suspected(&self, token_hash: &str, lookup: &TokenLookup) -> RotationError {
        match lookup.record() {
            Some(record) => {
                tracing::warn!(
                    user_id = record.user_id,
                    token_id = record.id,
                    state = lookup.state(),
                    token = log_prefix(token_hash),
                    "Rotation token reuse detected"
                );
                self.responder.respond(record.user_id, REUSE_MESSAGE).await;
            }
            None => {
                // No owner to lock out; reject without cascade.
                tracing::warn!(
                    state = lookup.state(),
                    token = log_prefix(token_hash),
                    "Unknown rotation token presented"
                );
            }
        }
        RotationError::TokenReuseDetected
    }

    /// Post-commit housekeeping. Failures are logged, never returned: the
    /// rotation has already committed and the client needs its new token.
    async fn after_commit(&self, user_id: DbId) {
        if let Err(e) = self
            .limiter
            .enforce_limit(user_id, self.config.max_sessions)
            .await
        {
            tracing::warn!(user_id, error = %e, "Session limit enforcement failed");
        }

        if self.config.purge_on_rotate {
            let ledger = Arc::clone(&self.ledger);
            tokio::spawn(async move {
                match ledger.purge_expired().await {
                    Ok(0) => {}
                    Ok(purged) => tracing::debug!(purged, "Purged expired rotation tokens"),
                    Err(e) => tracing::warn!(error = %e, "Expired token purge failed"),
                }
            });
        }
    }
}

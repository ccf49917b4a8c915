//! The rotation operation surface.
//!
//! [`RotationService`] wires the engine, limiter and breach responder
//! together over one ledger. The HTTP API and in-process clients both go
//! through it.

use std::sync::Arc;

use sentinel_core::device::DeviceInfo;
use sentinel_core::hashing::hash_rotation_token;
use sentinel_core::session::{RotatedCredentials, SessionSummary};
use sentinel_core::types::DbId;
use sentinel_core::validation::{validate_device_info, validate_raw_token};
use sentinel_db::models::rotation_token::NewRotationToken;
use sentinel_db::TokenLedger;
use sentinel_events::EventBus;

use crate::breach::BreachResponder;
use crate::config::RotationConfig;
use crate::engine::RotationEngine;
use crate::error::RotationError;
use crate::issuer::CredentialIssuer;
use crate::limiter::SessionLimiter;

#[derive(Clone)]
pub struct RotationService {
    ledger: Arc<dyn TokenLedger>,
    engine: RotationEngine,
    limiter: SessionLimiter,
    config: RotationConfig,
}

impl RotationService {
    pub fn new(
        ledger: Arc<dyn TokenLedger>,
        issuer: Arc<dyn CredentialIssuer>,
        event_bus: Arc<EventBus>,
        config: RotationConfig,
    ) -> Self {
        let limiter = SessionLimiter::new(Arc::clone(&ledger));
        let responder = BreachResponder::new(Arc::clone(&ledger), event_bus);
        let engine = RotationEngine::new(
            Arc::clone(&ledger),
            issuer,
            limiter.clone(),
            responder,
            config.clone(),
        );

        Self {
            ledger,
            engine,
            limiter,
            config,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn TokenLedger> {
        &self.ledger
    }

    pub fn config(&self) -> &RotationConfig {
        &self.config
    }

    /// Store a freshly issued rotation token for `user_id`, then trim the
    /// user's sessions to the configured cap.
    ///
    /// Fails with [`RotationError::DuplicateToken`] if the token is already
    /// live.
    pub async fn register_token(
        &self,
        raw_token: &str,
        user_id: DbId,
        device_info: DeviceInfo,
    ) -> Result<(), RotationError> {
        validate_raw_token(raw_token).map_err(|e| RotationError::InvalidToken(e.to_string()))?;
        validate_device_info(&device_info)?;

        let input = NewRotationToken::new(user_id, hash_rotation_token(raw_token), device_info)
            .with_ttl(self.config.registration_ttl);
        let token = self.ledger.insert(&input).await?;

        tracing::info!(user_id, token_id = token.id, "Rotation token registered");

        self.limiter
            .enforce_limit(user_id, self.config.max_sessions)
            .await?;
        Ok(())
    }

    /// Exchange `raw_token` for a new credential pair.
    ///
    /// See [`RotationEngine::rotate`].
    pub async fn rotate_token(
        &self,
        raw_token: &str,
        device_info: DeviceInfo,
    ) -> Result<RotatedCredentials, RotationError> {
        self.engine.rotate(raw_token, device_info).await
    }

    /// Sign the user out everywhere. Unlike a breach response this does not
    /// publish a security event.
    pub async fn revoke_all_sessions(&self, user_id: DbId) -> Result<u64, RotationError> {
        let revoked = self.ledger.revoke_all_for_user(user_id).await?;
        tracing::info!(user_id, revoked, "All sessions revoked by user");
        Ok(revoked)
    }

    /// The user's active sessions, most recently used first.
    pub async fn list_active_sessions(
        &self,
        user_id: DbId,
    ) -> Result<Vec<SessionSummary>, RotationError> {
        let active = self.ledger.list_active_for_user(user_id).await?;
        Ok(active.iter().map(|t| t.summary()).collect())
    }

    /// Revoke one of the user's own active sessions.
    ///
    /// Returns `false` if `session_id` is not an active session of `user_id`.
    pub async fn revoke_session(
        &self,
        user_id: DbId,
        session_id: DbId,
    ) -> Result<bool, RotationError> {
        let owned = self
            .ledger
            .list_active_for_user(user_id)
            .await?
            .iter()
            .any(|t| t.id == session_id);
        if !owned {
            return Ok(false);
        }

        let revoked = self.ledger.revoke(session_id).await?;
        if revoked {
            tracing::info!(user_id, token_id = session_id, "Session revoked by user");
        }
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use chrono::Utc;
    use sentinel_core::session::SessionUser;
    use sentinel_db::MemoryTokenLedger;
    use sentinel_events::SecurityBreachEvent;

    use super::*;
    use crate::issuer::{IssueRequest, IssuedCredentials, IssuerError};

    /// Hands out rotation tokens "B", "C", "D", ... in order.
    struct LetterIssuer {
        next: AtomicUsize,
    }

    #[async_trait]
    impl CredentialIssuer for LetterIssuer {
        async fn issue(&self, request: &IssueRequest) -> Result<IssuedCredentials, IssuerError> {
            let n = self.next.fetch_add(1, Ordering::SeqCst);
            let letter = char::from(b'B' + n as u8);
            Ok(IssuedCredentials {
                access_token: format!("access-{letter}"),
                rotation_token: letter.to_string(),
                expires_in: 900,
                rotation_expires_at: Utc::now() + chrono::Duration::days(7),
                user: SessionUser {
                    id: request.user_id,
                    role: "user".into(),
                },
            })
        }
    }

    fn service(config: RotationConfig) -> (RotationService, Arc<EventBus>) {
        let ledger = Arc::new(MemoryTokenLedger::new());
        let issuer = Arc::new(LetterIssuer {
            next: AtomicUsize::new(0),
        });
        let bus = Arc::new(EventBus::default());
        (
            RotationService::new(ledger, issuer, bus.clone(), config),
            bus,
        )
    }

    fn device(id: &str) -> DeviceInfo {
        DeviceInfo::new("Mozilla/5.0", id)
    }

    #[tokio::test]
    async fn scenario_a_rotate_then_replay() {
        let (svc, bus) = service(RotationConfig::default());
        let mut rx = bus.subscribe();

        svc.register_token("A", 1, device("d1")).await.unwrap();

        let creds = svc.rotate_token("A", device("d1")).await.unwrap();
        assert_eq!(creds.rotation_token, "B");
        assert_eq!(creds.user.id, 1);

        let err = svc.rotate_token("A", device("d1")).await.unwrap_err();
        assert_eq!(err, RotationError::TokenReuseDetected);
        assert!(svc.list_active_sessions(1).await.unwrap().is_empty());

        // The replacement went down with the rest of the family.
        let err = svc.rotate_token("B", device("d1")).await.unwrap_err();
        assert_eq!(err, RotationError::TokenReuseDetected);

        let event = rx.recv().await.unwrap();
        assert_eq!(
            SecurityBreachEvent::from_platform_event(&event).unwrap().user_id,
            1
        );
    }

    #[tokio::test]
    async fn scenario_b_sixth_session_evicts_oldest() {
        let (svc, _bus) = service(RotationConfig {
            max_sessions: 5,
            ..RotationConfig::default()
        });

        for i in 0..5 {
            svc.register_token(&format!("t{i}"), 2, device(&format!("d{i}")))
                .await
                .unwrap();
        }
        assert_eq!(svc.list_active_sessions(2).await.unwrap().len(), 5);

        svc.register_token("t5", 2, device("d5")).await.unwrap();

        let active = svc.list_active_sessions(2).await.unwrap();
        assert_eq!(active.len(), 5);
        assert!(active.iter().all(|s| s.device_info.stable_device_id != "d0"));
        assert!(active.iter().any(|s| s.device_info.stable_device_id == "d5"));
    }

    #[tokio::test]
    async fn scenario_c_unknown_token_is_reuse() {
        let (svc, _bus) = service(RotationConfig::default());

        let err = svc.rotate_token("X", device("d1")).await.unwrap_err();
        assert_eq!(err, RotationError::TokenReuseDetected);
        assert_eq!(err.code(), "TOKEN_REUSE_DETECTED");
    }

    #[tokio::test]
    async fn register_rejects_duplicates_and_bad_input() {
        let (svc, _bus) = service(RotationConfig::default());
        svc.register_token("A", 1, device("d1")).await.unwrap();

        assert_eq!(
            svc.register_token("A", 1, device("d1")).await.unwrap_err(),
            RotationError::DuplicateToken
        );
        assert_matches!(
            svc.register_token("  padded ", 1, device("d1")).await,
            Err(RotationError::InvalidToken(_))
        );
    }

    #[tokio::test]
    async fn revoke_all_is_silent_and_idempotent() {
        let (svc, bus) = service(RotationConfig::default());
        let mut rx = bus.subscribe();
        svc.register_token("A", 1, device("d1")).await.unwrap();
        svc.register_token("B2", 1, device("d2")).await.unwrap();

        assert_eq!(svc.revoke_all_sessions(1).await.unwrap(), 2);
        assert_eq!(svc.revoke_all_sessions(1).await.unwrap(), 0);
        assert!(svc.list_active_sessions(1).await.unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn revoke_session_only_touches_own_sessions() {
        let (svc, _bus) = service(RotationConfig::default());
        svc.register_token("mine", 1, device("d1")).await.unwrap();
        svc.register_token("theirs", 2, device("d2")).await.unwrap();

        let mine = svc.list_active_sessions(1).await.unwrap()[0].id;
        let theirs = svc.list_active_sessions(2).await.unwrap()[0].id;

        assert!(!svc.revoke_session(1, theirs).await.unwrap());
        assert_eq!(svc.list_active_sessions(2).await.unwrap().len(), 1);

        assert!(svc.revoke_session(1, mine).await.unwrap());
        assert!(!svc.revoke_session(1, mine).await.unwrap());
        assert!(svc.list_active_sessions(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn session_summaries_carry_device_info() {
        let (svc, _bus) = service(RotationConfig::default());
        svc.register_token("A", 1, device("laptop")).await.unwrap();
        svc.rotate_token("A", device("laptop")).await.unwrap();

        let sessions = svc.list_active_sessions(1).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].device_info, device("laptop"));
        assert!(sessions[0].last_used_at.is_some());
    }
}

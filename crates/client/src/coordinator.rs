//! Client-side rotation coordinator.
//!
//! Owns the locally stored rotation token and is the only code that
//! presents it. Concurrent [`RotationCoordinator::rotate`] calls from one
//! process (several tabs or tasks refreshing at once) join a single
//! in-flight rotation. The flight reads the stored token itself, so a caller
//! that arrives after a rotation finished picks up the new token instead of
//! replaying the old one.
//!
//! A rotation the backend committed is never lost to a local write failure.
//! The new token is kept in memory, presented ahead of the stored one, and
//! written again on the next rotation.
//!
//! A [`RotationError::TokenReuseDetected`] answer means every session of the
//! user is gone. The coordinator wipes its local credentials and raises
//! [`SignOut::TokenReuse`] on the watch channel; the host application
//! decides how to send the user back to sign-in.

use std::sync::{Arc, Mutex, PoisonError};

use sentinel_core::session::{RotatedCredentials, SessionSummary};
use sentinel_core::single_flight::SingleFlight;
use sentinel_core::types::DbId;
use sentinel_rotation::RotationError;
use tokio::sync::watch;

use crate::backend::RotationBackend;
use crate::device::DeviceIdentityHelper;
use crate::error::ClientError;
use crate::storage::{SecretStore, KEY_ROTATION_TOKEN};

/// Why the client was signed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOut {
    /// The backend reported reuse of our rotation token.
    TokenReuse,
    /// The user asked to sign out everywhere.
    UserInitiated,
}

type RotateResult = Result<RotatedCredentials, ClientError>;

struct Inner {
    backend: Arc<dyn RotationBackend>,
    store: Arc<dyn SecretStore>,
    device: DeviceIdentityHelper,
    user_id: Mutex<Option<DbId>>,
    /// Newest token, held while the store refuses to take it.
    unsaved: Mutex<Option<String>>,
    sign_out: watch::Sender<Option<SignOut>>,
}

#[derive(Clone)]
pub struct RotationCoordinator {
    inner: Arc<Inner>,
    flights: SingleFlight<&'static str, RotateResult>,
}

impl RotationCoordinator {
    pub fn new(
        backend: Arc<dyn RotationBackend>,
        store: Arc<dyn SecretStore>,
        user_agent: impl Into<String>,
    ) -> Self {
        let device = DeviceIdentityHelper::new(Arc::clone(&store), user_agent);
        let (sign_out, _) = watch::channel(None);

        Self {
            inner: Arc::new(Inner {
                backend,
                store,
                device,
                user_id: Mutex::new(None),
                unsaved: Mutex::new(None),
                sign_out,
            }),
            flights: SingleFlight::new(),
        }
    }

    pub fn device(&self) -> &DeviceIdentityHelper {
        &self.inner.device
    }

    /// Receiver that changes to `Some(reason)` when the client is signed out.
    pub fn sign_out_signal(&self) -> watch::Receiver<Option<SignOut>> {
        self.inner.sign_out.subscribe()
    }

    /// Whether a rotation token is held locally.
    pub fn is_signed_in(&self) -> bool {
        self.inner.unsaved().is_some() || self.inner.store.exists(KEY_ROTATION_TOKEN)
    }

    pub fn user_id(&self) -> Option<DbId> {
        *self.inner.user_id()
    }

    /// Register a freshly issued rotation token with the backend and keep it
    /// locally.
    ///
    /// Never fails the caller's sign-in: any error is logged and reported as
    /// `false`.
    pub async fn register(&self, raw_token: &str, user_id: DbId) -> bool {
        let inner = &self.inner;

        let device_info = match inner.device.device_info() {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Token registration skipped: no device id");
                return false;
            }
        };

        if let Err(e) = inner
            .backend
            .register_token(raw_token, user_id, device_info)
            .await
        {
            tracing::warn!(user_id, error = %e, "Token registration failed");
            return false;
        }

        if let Err(e) = inner.store.store(KEY_ROTATION_TOKEN, raw_token.as_bytes()) {
            tracing::warn!(user_id, error = %e, "Registered token could not be stored locally");
            return false;
        }

        *inner.unsaved() = None;
        *inner.user_id() = Some(user_id);
        inner.sign_out.send_replace(None);
        tracing::debug!(user_id, "Rotation token registered");
        true
    }

    /// Rotate the locally held token.
    ///
    /// Issuer and storage failures leave the current token in place so the
    /// call can be retried.
    pub async fn rotate(&self) -> RotateResult {
        let inner = Arc::clone(&self.inner);
        self.flights
            .run(KEY_ROTATION_TOKEN, move || async move { inner.rotate_once().await })
            .await
            .unwrap_or_else(|aborted| {
                tracing::error!(error = %aborted, "Rotation task died");
                Err(ClientError::Transport(aborted.to_string()))
            })
    }

    /// Revoke every session of the user on the backend, then sign out here.
    pub async fn revoke_all_sessions(&self) -> Result<(), ClientError> {
        let user_id = self.user_id().ok_or(ClientError::NotSignedIn)?;
        self.inner.backend.revoke_all_sessions(user_id).await?;
        self.inner.sign_out(SignOut::UserInitiated);
        Ok(())
    }

    pub async fn list_active_sessions(&self) -> Result<Vec<SessionSummary>, ClientError> {
        let user_id = self.user_id().ok_or(ClientError::NotSignedIn)?;
        self.inner.backend.list_active_sessions(user_id).await
    }
}

impl Inner {
    fn user_id(&self) -> std::sync::MutexGuard<'_, Option<DbId>> {
        self.user_id.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unsaved(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.unsaved.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The token to present: an unsaved one wins over the store, and gets
    /// another chance to be written first.
    fn current_token(&self) -> Result<String, ClientError> {
        let mut unsaved = self.unsaved();
        if let Some(token) = unsaved.clone() {
            match self.store.store(KEY_ROTATION_TOKEN, token.as_bytes()) {
                Ok(()) => *unsaved = None,
                Err(e) => tracing::warn!(error = %e, "Rotation token still not stored locally"),
            }
            return Ok(token);
        }
        drop(unsaved);

        self.store
            .retrieve_string(KEY_ROTATION_TOKEN)?
            .ok_or(ClientError::NotSignedIn)
    }

    fn keep(&self, token: &str) {
        let mut unsaved = self.unsaved();
        match self.store.store(KEY_ROTATION_TOKEN, token.as_bytes()) {
            Ok(()) => *unsaved = None,
            Err(e) => {
                tracing::warn!(error = %e, "Rotated token held in memory; store write failed");
                *unsaved = Some(token.to_string());
            }
        }
    }

    async fn rotate_once(&self) -> RotateResult {
        let current = self.current_token()?;
        let device_info = self.device.device_info()?;

        match self.backend.rotate_token(&current, device_info).await {
            Ok(credentials) => {
                self.keep(&credentials.rotation_token);
                *self.user_id() = Some(credentials.user.id);
                tracing::debug!(user_id = credentials.user.id, "Rotation token rotated");
                Ok(credentials)
            }
            Err(ClientError::Rotation(RotationError::TokenReuseDetected)) => {
                tracing::warn!("Rotation token rejected as reused; signing out");
                self.sign_out(SignOut::TokenReuse);
                Err(ClientError::Rotation(RotationError::TokenReuseDetected))
            }
            Err(e) => {
                tracing::warn!(error = %e, retryable = is_retryable(&e), "Rotation failed");
                Err(e)
            }
        }
    }

    /// Drop local credentials and notify subscribers. Reuse also drops the
    /// device id so the next sign-in registers as a new device.
    fn sign_out(&self, reason: SignOut) {
        *self.unsaved() = None;
        if let Err(e) = self.store.remove(KEY_ROTATION_TOKEN) {
            tracing::error!(error = %e, "Failed to clear stored rotation token");
        }
        if reason == SignOut::TokenReuse {
            if let Err(e) = self.device.forget() {
                tracing::error!(error = %e, "Failed to clear stored device id");
            }
        }
        *self.user_id() = None;
        self.sign_out.send_replace(Some(reason));
    }
}

fn is_retryable(err: &ClientError) -> bool {
    match err {
        ClientError::Rotation(e) => e.is_retryable(),
        ClientError::Transport(_) | ClientError::Server { .. } => true,
        _ => false,
    }
}

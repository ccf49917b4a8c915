//! Where the coordinator sends rotation operations.
//!
//! [`RotationService`] is a backend when client and server share a process;
//! [`HttpBackend`] talks to the `/api/v1` surface of a remote server.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use sentinel_core::device::DeviceInfo;
use sentinel_core::session::{RotatedCredentials, SessionSummary};
use sentinel_core::types::DbId;
use sentinel_rotation::{RotationError, RotationService};
use serde::Deserialize;
use serde_json::json;

use crate::error::ClientError;

#[async_trait]
pub trait RotationBackend: Send + Sync {
    async fn register_token(
        &self,
        raw_token: &str,
        user_id: DbId,
        device_info: DeviceInfo,
    ) -> Result<(), ClientError>;

    async fn rotate_token(
        &self,
        raw_token: &str,
        device_info: DeviceInfo,
    ) -> Result<RotatedCredentials, ClientError>;

    async fn revoke_all_sessions(&self, user_id: DbId) -> Result<(), ClientError>;

    async fn list_active_sessions(&self, user_id: DbId)
        -> Result<Vec<SessionSummary>, ClientError>;
}

#[async_trait]
impl RotationBackend for RotationService {
    async fn register_token(
        &self,
        raw_token: &str,
        user_id: DbId,
        device_info: DeviceInfo,
    ) -> Result<(), ClientError> {
        Ok(RotationService::register_token(self, raw_token, user_id, device_info).await?)
    }

    async fn rotate_token(
        &self,
        raw_token: &str,
        device_info: DeviceInfo,
    ) -> Result<RotatedCredentials, ClientError> {
        Ok(RotationService::rotate_token(self, raw_token, device_info).await?)
    }

    async fn revoke_all_sessions(&self, user_id: DbId) -> Result<(), ClientError> {
        RotationService::revoke_all_sessions(self, user_id).await?;
        Ok(())
    }

    async fn list_active_sessions(
        &self,
        user_id: DbId,
    ) -> Result<Vec<SessionSummary>, ClientError> {
        Ok(RotationService::list_active_sessions(self, user_id).await?)
    }
}

// ---------------------------------------------------------------------------
// HttpBackend
// ---------------------------------------------------------------------------

/// Error body returned by the API: `{ "error": ..., "code": ... }`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
}

#[derive(Debug, Deserialize)]
struct DataBody<T> {
    data: T,
}

/// HTTP client for a remote rotation server.
///
/// The server identifies the user from the bearer access token, so the
/// `user_id` arguments of [`RotationBackend`] are not sent. The access token
/// is replaced automatically after every successful rotation.
pub struct HttpBackend {
    client: reqwest::Client,
    api_url: String,
    access_token: RwLock<Option<String>>,
}

impl HttpBackend {
    /// * `api_url` - Base URL including the version prefix, e.g.
    ///   `https://auth.example.com/api/v1`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            access_token: RwLock::new(None),
        }
    }

    /// Set the bearer access token obtained at sign-in.
    pub fn set_access_token(&self, token: impl Into<String>) {
        *self
            .access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    pub fn access_token(&self) -> Option<String> {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn bearer(&self) -> Result<String, ClientError> {
        self.access_token()
            .ok_or_else(|| ClientError::Unauthorized("No access token set".into()))
    }

    // ---- private helpers ----

    /// Return the response on 2xx, otherwise decode the `{error, code}` body
    /// into a [`ClientError`].
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let err = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => classify_error(status.as_u16(), body),
            Err(_) => ClientError::Server {
                status: status.as_u16(),
                message: text,
            },
        };
        Err(err)
    }
}

/// Map an API error body back onto the client taxonomy.
fn classify_error(status: u16, body: ErrorBody) -> ClientError {
    match body.code.as_str() {
        "UNAUTHORIZED" => ClientError::Unauthorized(body.error),
        "TOKEN_REUSE_DETECTED" | "INVALID_TOKEN" | "VALIDATION_ERROR" | "CONFLICT"
        | "ISSUER_FAILURE" | "STORAGE_FAILURE" => {
            ClientError::Rotation(RotationError::from_code(&body.code, body.error))
        }
        _ => ClientError::Server {
            status,
            message: body.error,
        },
    }
}

#[async_trait]
impl RotationBackend for HttpBackend {
    async fn register_token(
        &self,
        raw_token: &str,
        _user_id: DbId,
        device_info: DeviceInfo,
    ) -> Result<(), ClientError> {
        let response = self
            .client
            .post(format!("{}/tokens/register", self.api_url))
            .bearer_auth(self.bearer()?)
            .json(&json!({ "raw_token": raw_token, "device_info": device_info }))
            .send()
            .await?;

        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn rotate_token(
        &self,
        raw_token: &str,
        device_info: DeviceInfo,
    ) -> Result<RotatedCredentials, ClientError> {
        let response = self
            .client
            .post(format!("{}/tokens/rotate", self.api_url))
            .json(&json!({ "raw_token": raw_token, "device_info": device_info }))
            .send()
            .await?;

        let credentials: RotatedCredentials = Self::ensure_success(response).await?.json().await?;
        self.set_access_token(credentials.access_token.clone());
        Ok(credentials)
    }

    async fn revoke_all_sessions(&self, _user_id: DbId) -> Result<(), ClientError> {
        let response = self
            .client
            .post(format!("{}/sessions/revoke-all", self.api_url))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;

        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn list_active_sessions(
        &self,
        _user_id: DbId,
    ) -> Result<Vec<SessionSummary>, ClientError> {
        let response = self
            .client
            .get(format!("{}/sessions", self.api_url))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;

        let body: DataBody<Vec<SessionSummary>> =
            Self::ensure_success(response).await?.json().await?;
        Ok(body.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(code: &str) -> ErrorBody {
        ErrorBody {
            error: "message".into(),
            code: code.into(),
        }
    }

    #[test]
    fn rotation_codes_map_back_to_rotation_errors() {
        assert_eq!(
            classify_error(401, body("TOKEN_REUSE_DETECTED")),
            ClientError::Rotation(RotationError::TokenReuseDetected)
        );
        assert_eq!(
            classify_error(503, body("ISSUER_FAILURE")),
            ClientError::Rotation(RotationError::IssuerFailure("message".into()))
        );
    }

    #[test]
    fn other_codes_stay_distinct() {
        assert_eq!(
            classify_error(401, body("UNAUTHORIZED")),
            ClientError::Unauthorized("message".into())
        );
        assert_eq!(
            classify_error(500, body("INTERNAL_ERROR")),
            ClientError::Server {
                status: 500,
                message: "message".into()
            }
        );
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let backend = HttpBackend::new("http://localhost:3000/api/v1/");
        assert_eq!(backend.api_url, "http://localhost:3000/api/v1");
        assert!(backend.access_token().is_none());
    }
}

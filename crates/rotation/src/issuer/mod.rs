//! The credential issuer seam.
//!
//! A [`CredentialIssuer`] mints a fresh access credential plus a replacement
//! rotation token for a user whose current rotation token has already been
//! validated. The engine bounds every call with a timeout and never touches
//! the ledger when issuance fails.

pub mod jwt;

use async_trait::async_trait;
use sentinel_core::device::DeviceInfo;
use sentinel_core::session::SessionUser;
use sentinel_core::types::{DbId, Timestamp};

pub use jwt::{JwtConfig, JwtIssuer};

/// Input to [`CredentialIssuer::issue`].
#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub user_id: DbId,
    pub device_info: DeviceInfo,
}

/// A freshly minted credential pair.
#[derive(Debug, Clone)]
pub struct IssuedCredentials {
    pub access_token: String,
    /// Plaintext replacement rotation token. Never persisted.
    pub rotation_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// Expiry of the replacement rotation token.
    pub rotation_expires_at: Timestamp,
    pub user: SessionUser,
}

#[derive(Debug, thiserror::Error)]
pub enum IssuerError {
    #[error("Token signing failed: {0}")]
    Signing(String),

    #[error("Issuer unavailable: {0}")]
    Unavailable(String),
}

/// Mints access + rotation credential pairs.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    async fn issue(&self, request: &IssueRequest) -> Result<IssuedCredentials, IssuerError>;
}

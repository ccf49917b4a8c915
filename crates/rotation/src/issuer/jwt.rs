//! Local issuer: HS256 access tokens plus opaque rotation tokens.
//!
//! Rotation tokens come from [`generate_rotation_token`]; only their hash is
//! ever stored, and they are never valid bearer credentials.

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sentinel_core::env::{env_or, env_required};
use sentinel_core::hashing::generate_rotation_token;
use sentinel_core::session::SessionUser;
use sentinel_core::types::DbId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CredentialIssuer, IssueRequest, IssuedCredentials, IssuerError};

/// Payload of an access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    /// User id.
    pub sub: DbId,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    /// Per-token id, for audit trails.
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expiry_mins: i64,
    /// Lifetime of rotation tokens minted on rotation.
    pub rotation_token_expiry_days: i64,
    /// Role claim stamped on every access token.
    pub default_role: String,
}

impl JwtConfig {
    /// | Env Var                    | Required | Default |
    /// |----------------------------|----------|---------|
    /// | `JWT_SECRET`               | **yes**  | --      |
    /// | `JWT_ACCESS_EXPIRY_MINS`   | no       | `15`    |
    /// | `JWT_ROTATION_EXPIRY_DAYS` | no       | `7`     |
    /// | `JWT_DEFAULT_ROLE`         | no       | `user`  |
    pub fn from_env() -> Self {
        Self {
            secret: env_required("JWT_SECRET"),
            access_token_expiry_mins: env_or("JWT_ACCESS_EXPIRY_MINS", 15),
            rotation_token_expiry_days: env_or("JWT_ROTATION_EXPIRY_DAYS", 7),
            default_role: env_or("JWT_DEFAULT_ROLE", "user".to_string()),
        }
    }

    /// Defaults (15 minutes, 7 days, role `user`) with the given secret.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_token_expiry_mins: 15,
            rotation_token_expiry_days: 7,
            default_role: "user".into(),
        }
    }

    fn access_ttl_secs(&self) -> i64 {
        self.access_token_expiry_mins * 60
    }
}

pub fn encode_access_token(
    user_id: DbId,
    role: &str,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let iat = Utc::now().timestamp();
    let claims = AccessClaims {
        sub: user_id,
        role: role.to_string(),
        iat,
        exp: iat + config.access_ttl_secs(),
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Check signature and expiry, then return the claims.
pub fn decode_access_token(
    token: &str,
    config: &JwtConfig,
) -> Result<AccessClaims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

pub struct JwtIssuer {
    config: JwtConfig,
}

impl JwtIssuer {
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CredentialIssuer for JwtIssuer {
    async fn issue(&self, request: &IssueRequest) -> Result<IssuedCredentials, IssuerError> {
        let role = &self.config.default_role;
        let access_token = encode_access_token(request.user_id, role, &self.config)
            .map_err(|e| IssuerError::Signing(e.to_string()))?;

        Ok(IssuedCredentials {
            access_token,
            rotation_token: generate_rotation_token(),
            expires_in: self.config.access_ttl_secs(),
            rotation_expires_at: Utc::now()
                + chrono::Duration::days(self.config.rotation_token_expiry_days),
            user: SessionUser {
                id: request.user_id,
                role: role.clone(),
            },
        })
    }
}

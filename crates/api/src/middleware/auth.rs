//! Bearer access-token extractor.
//!
//! Only signed access tokens authenticate a request. Rotation tokens are
//! opaque and fail signature validation like any other garbage.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use sentinel_core::error::CoreError;
use sentinel_core::types::DbId;
use sentinel_rotation::issuer::jwt::decode_access_token;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: DbId,
    pub role: String,
}

/// Pull the token out of `Authorization: Bearer <token>`.
fn bearer_token(parts: &Parts) -> Result<&str, &'static str> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or("Missing Authorization header")?
        .to_str()
        .map_err(|_| "Malformed Authorization header")?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or("Expected a Bearer access token")
}

fn unauthorized(message: &str) -> AppError {
    AppError::Core(CoreError::Unauthorized(message.to_string()))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).map_err(unauthorized)?;

        let claims = decode_access_token(token, &state.config.jwt).map_err(|e| {
            tracing::debug!(error = %e, "Rejected access token");
            unauthorized("Invalid or expired access token")
        })?;

        Ok(Self {
            user_id: claims.sub,
            role: claims.role,
        })
    }
}

//! Handlers for the `/tokens` resource (register, rotate).

use axum::extract::State;
use axum::Json;
use sentinel_core::device::DeviceInfo;
use sentinel_core::session::RotatedCredentials;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::SuccessResponse;
use crate::state::AppState;

/// Request body shared by `POST /tokens/register` and `POST /tokens/rotate`.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub raw_token: String,
    #[serde(default)]
    pub device_info: DeviceInfo,
}

/// POST /api/v1/tokens/register
///
/// Store a rotation token minted for the authenticated user.
pub async fn register(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<TokenRequest>,
) -> AppResult<Json<SuccessResponse>> {
    state
        .rotation
        .register_token(&input.raw_token, user.user_id, input.device_info)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

/// POST /api/v1/tokens/rotate
///
/// Exchange a rotation token for a new access token and rotation token.
/// Unauthenticated: the rotation token is the credential.
pub async fn rotate(
    State(state): State<AppState>,
    Json(input): Json<TokenRequest>,
) -> AppResult<Json<RotatedCredentials>> {
    let credentials = state
        .rotation
        .rotate_token(&input.raw_token, input.device_info)
        .await?;
    Ok(Json(credentials))
}

//! Handlers for the `/sessions` resource.
//!
//! All routes act on the authenticated user's own sessions.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sentinel_core::error::CoreError;
use sentinel_core::session::SessionSummary;
use sentinel_core::types::DbId;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::{DataResponse, SuccessResponse};
use crate::state::AppState;

/// GET /api/v1/sessions
pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<SessionSummary>>>> {
    let sessions = state.rotation.list_active_sessions(user.user_id).await?;
    Ok(Json(DataResponse { data: sessions }))
}

/// POST /api/v1/sessions/revoke-all
///
/// Sign out everywhere, including the calling device.
pub async fn revoke_all(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<SuccessResponse>> {
    state.rotation.revoke_all_sessions(user.user_id).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// DELETE /api/v1/sessions/{id}
pub async fn revoke(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let revoked = state.rotation.revoke_session(user.user_id, id).await?;
    if revoked {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound {
            entity: "Session",
            id,
        }))
    }
}

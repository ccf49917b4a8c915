//! Route definitions for the `/sessions` resource.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::sessions;
use crate::state::AppState;

/// Routes mounted at `/sessions`.
///
/// ```text
/// GET    /             -> list
/// POST   /revoke-all   -> revoke_all
/// DELETE /{id}         -> revoke
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(sessions::list))
        .route("/revoke-all", post(sessions::revoke_all))
        .route("/{id}", delete(sessions::revoke))
}

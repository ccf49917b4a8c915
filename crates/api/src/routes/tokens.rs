//! Route definitions for the `/tokens` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::tokens;
use crate::state::AppState;

/// Routes mounted at `/tokens`.
///
/// ```text
/// POST /register  -> register (requires auth)
/// POST /rotate    -> rotate
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(tokens::register))
        .route("/rotate", post(tokens::rotate))
}

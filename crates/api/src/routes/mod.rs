pub mod health;
pub mod sessions;
pub mod tokens;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /tokens/register        register a rotation token (requires auth)
/// /tokens/rotate          rotate (public; the rotation token is the credential)
///
/// /sessions               list own active sessions (requires auth)
/// /sessions/revoke-all    sign out everywhere (requires auth)
/// /sessions/{id}          revoke one session (requires auth)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/tokens", tokens::router())
        .nest("/sessions", sessions::router())
}

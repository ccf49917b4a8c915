use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::config::LedgerBackend;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the ledger cannot be reached.
    pub status: &'static str,
    pub version: &'static str,
    pub ledger: &'static str,
    pub ledger_healthy: bool,
}

/// GET /health. Answers 503 while the ledger is unreachable so load balancers
/// stop routing rotations here.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let ledger_healthy = match state.rotation.ledger().health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Ledger health check failed");
            false
        }
    };

    let (status, label) = if ledger_healthy {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let ledger = match state.config.ledger_backend {
        LedgerBackend::Postgres => "postgres",
        LedgerBackend::Memory => "memory",
    };

    (
        status,
        Json(HealthResponse {
            status: label,
            version: env!("CARGO_PKG_VERSION"),
            ledger,
            ledger_healthy,
        }),
    )
}

/// Mounted at the root, outside `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

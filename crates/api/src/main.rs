use std::sync::Arc;
use std::time::Duration;

use sentinel_api::config::{LedgerBackend, ServerConfig};
use sentinel_api::router::build_app_router;
use sentinel_api::state::AppState;
use sentinel_core::env::env_required;
use sentinel_db::{MemoryTokenLedger, PgTokenLedger, TokenLedger};
use sentinel_events::{EventBus, SecurityLog};
use sentinel_rotation::issuer::JwtIssuer;
use sentinel_rotation::{sweeper, RotationService};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env();
    tracing::info!(
        addr = %config.bind_addr(),
        ledger = ?config.ledger_backend,
        max_sessions = config.rotation.max_sessions,
        "Loaded server configuration"
    );

    let ledger = open_ledger(config.ledger_backend).await;

    let event_bus = Arc::new(EventBus::default());
    let security_log = tokio::spawn(SecurityLog::run(event_bus.subscribe()));

    let rotation = Arc::new(RotationService::new(
        Arc::clone(&ledger),
        Arc::new(JwtIssuer::new(config.jwt.clone())),
        Arc::clone(&event_bus),
        config.rotation.clone(),
    ));

    let sweep_cancel = CancellationToken::new();
    let sweep_handle = tokio::spawn(sweeper::run(
        Arc::clone(&ledger),
        config.rotation.purge_interval,
        sweep_cancel.clone(),
    ));

    let state = AppState {
        rotation,
        config: Arc::new(config.clone()),
        event_bus: Arc::clone(&event_bus),
    };
    let app = build_app_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .unwrap_or_else(|e| panic!("Failed to bind {}: {e}", config.bind_addr()));
    tracing::info!(addr = %config.bind_addr(), "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server stopped accepting connections, cleaning up");
    let drain = Duration::from_secs(config.shutdown_timeout_secs);

    sweep_cancel.cancel();
    if tokio::time::timeout(drain, sweep_handle).await.is_err() {
        tracing::warn!("Token sweeper did not stop in time");
    }

    // The security log ends once the last bus handle is gone.
    drop(event_bus);
    let _ = tokio::time::timeout(drain, security_log).await;

    tracing::info!("Shutdown complete");
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "sentinel_api=debug,sentinel_rotation=debug,sentinel_events=info,tower_http=info".into()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Open the configured ledger. Postgres is checked and migrated before use.
async fn open_ledger(backend: LedgerBackend) -> Arc<dyn TokenLedger> {
    match backend {
        LedgerBackend::Postgres => {
            let database_url = env_required("DATABASE_URL");

            let pool = sentinel_db::create_pool(&database_url)
                .await
                .expect("Failed to connect to database");
            sentinel_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            sentinel_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Postgres ledger ready");

            Arc::new(PgTokenLedger::new(pool))
        }
        LedgerBackend::Memory => {
            tracing::warn!("Using in-memory token ledger; sessions will not survive a restart");
            Arc::new(MemoryTokenLedger::new())
        }
    }
}

/// Wait for SIGINT or (on Unix) SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

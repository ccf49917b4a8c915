use std::sync::Arc;

use sentinel_events::EventBus;
use sentinel_rotation::RotationService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Rotation operations over the configured ledger.
    pub rotation: Arc<RotationService>,
    /// Server configuration (JWT settings are read by the auth extractor).
    pub config: Arc<ServerConfig>,
    /// Event bus breach events are published on.
    pub event_bus: Arc<EventBus>,
}

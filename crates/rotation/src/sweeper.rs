//! Periodic purge of expired rotation tokens.
//!
//! Revoked rows are kept until they expire so that replaying them is still
//! recognised as reuse; this loop removes them afterwards.

use std::sync::Arc;
use std::time::Duration;

use sentinel_db::TokenLedger;
use tokio_util::sync::CancellationToken;

/// Run the sweep loop until `cancel` is triggered.
///
/// The first sweep happens immediately.
pub async fn run(ledger: Arc<dyn TokenLedger>, every: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = every.as_secs(), "Token sweeper started");

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Token sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                match ledger.purge_expired().await {
                    Ok(0) => tracing::debug!("Token sweeper: nothing to purge"),
                    Ok(purged) => tracing::info!(purged, "Token sweeper: purged expired tokens"),
                    Err(e) => tracing::error!(error = %e, "Token sweeper: purge failed"),
                }
            }
        }
    }
}

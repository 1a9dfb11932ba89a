//! Background store maintenance

use authgate_db::{Database, DbError};
use chrono::Utc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{info, warn};

/// Delete refresh-token rows whose expiry has passed
pub async fn prune_expired_refresh_tokens(db: &Database) -> Result<u64, DbError> {
    let pruned = db.delete_expired_refresh_tokens(Utc::now()).await?;
    if pruned > 0 {
        info!("Removed {} expired refresh tokens", pruned);
    }
    Ok(pruned)
}

/// Spawn a background task that prunes expired refresh tokens every `period`
pub fn spawn_pruning_task(db: Database, period: Duration) -> JoinHandle<()> {
    info!(
        "Starting refresh token pruning task (interval: {} seconds)",
        period.as_secs()
    );

    tokio::spawn(async move {
        let mut ticker = interval(period);

        // The first tick fires immediately; startup already pruned
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = prune_expired_refresh_tokens(&db).await {
                warn!("Error pruning refresh tokens: {}", e);
            }
        }
    })
}

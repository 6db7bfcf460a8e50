use super::LinkStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Periodically purge expired links until `cancel` fires.
pub async fn run_sweeper(store: Arc<LinkStore>, every: Duration, cancel: CancellationToken) {
    info!("Link sweeper started, interval={}s", every.as_secs());

    let mut interval = time::interval(every);
    // The first tick completes immediately
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let purged = store.purge_expired().await;
                if purged > 0 {
                    let remaining = store.len().await;
                    info!(purged, remaining, "Purged expired links");
                } else {
                    debug!("Link sweep found nothing to purge");
                }
            }
            () = cancel.cancelled() => {
                info!("Link sweeper shutting down");
                break;
            }
        }
    }
}

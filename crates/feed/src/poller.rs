//! Periodic background reload of the catalog.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use charfeed_core::ports::CatalogSource;
use charfeed_events::InvalidationReason;

use crate::service::FeedService;

/// Reload the catalog every `period` until `cancel` is triggered.
///
/// The first reload happens one full period after start; the initial load
/// is the caller's job. Polls do not ask the backend to bypass its caches.
pub async fn run_poller<S>(feed: Arc<FeedService<S>>, period: Duration, cancel: CancellationToken)
where
    S: CatalogSource + ?Sized,
{
    tracing::info!(interval_secs = period.as_secs(), "Catalog poller started");

    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Catalog poller stopping");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = feed.refresh(InvalidationReason::Poll).await {
                    tracing::warn!(error = %e, "Scheduled catalog reload failed");
                }
            }
        }
    }
}

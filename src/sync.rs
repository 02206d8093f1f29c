//! Idempotent sync pipeline: fetch, invalidate, upsert.

use std::sync::Arc;

use tracing::{error, info};

use crate::cache::BucketCacheStrategy;
use crate::provider::EventProvider;
use crate::store::DurableStore;

pub struct SyncPipeline {
    provider: Arc<dyn EventProvider>,
    strategy: Arc<BucketCacheStrategy>,
    store: Arc<dyn DurableStore>,
}

impl SyncPipeline {
    pub fn new(
        provider: Arc<dyn EventProvider>,
        strategy: Arc<BucketCacheStrategy>,
        store: Arc<dyn DurableStore>,
    ) -> Self {
        Self {
            provider,
            strategy,
            store,
        }
    }

    /// Runs one full sync cycle. Never returns an error: every failure mode
    /// is logged and swallowed so the scheduler keeps ticking.
    pub async fn sync_once(&self) {
        let events = match self.provider.fetch_online_events().await {
            Ok(events) => events,
            Err(e) => {
                error!(error = %e, "provider fetch failed, skipping this sync");
                metrics::counter!("sync_failures_total").increment(1);
                return;
            }
        };

        if events.is_empty() {
            info!("provider returned no online events, nothing to sync");
            return;
        }

        metrics::counter!("sync_attempts_total").increment(1);

        // Invalidation must complete before the upsert begins: a reader can
        // then only observe (pre-write store, absent bucket) or (post-write
        // store, filled-by-me bucket), never a stale bucket paired with a
        // post-write store.
        if let Err(e) = self.strategy.invalidate(&events).await {
            error!(error = %e, "bucket invalidation failed, continuing with upsert");
        }

        match self.store.upsert_batch(&events).await {
            Ok(counts) => {
                info!(
                    inserted = counts.inserted,
                    updated = counts.updated,
                    "sync upsert complete"
                );
            }
            Err(e) => {
                error!(error = %e, "durable upsert failed");
                metrics::counter!("sync_failures_total").increment(1);
            }
        }
    }
}

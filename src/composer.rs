//! Range query composer: the single read entry point the HTTP layer calls.

use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::warn;

use crate::cache::{BucketCacheStrategy, CacheOutcome, StrategyError};
use crate::domain::Event;
use crate::error::SearchError;
use crate::store::DurableStore;

pub struct Composer {
    strategy: Arc<BucketCacheStrategy>,
    store: Arc<dyn DurableStore>,
}

impl Composer {
    pub fn new(strategy: Arc<BucketCacheStrategy>, store: Arc<dyn DurableStore>) -> Self {
        Self { strategy, store }
    }

    pub async fn search(
        &self,
        from_ts: NaiveDateTime,
        to_ts: NaiveDateTime,
    ) -> Result<Vec<Event>, SearchError> {
        if from_ts > to_ts {
            return Err(SearchError::InvalidRange);
        }

        match self.strategy.query(from_ts, to_ts, self.store.as_ref()).await {
            Ok(CacheOutcome::Hit(events)) => Ok(events),
            Ok(CacheOutcome::Bypass) => {
                // Too many months for bucket lookups; go straight to the
                // durable store, then fill the buckets for next time.
                let events = self.store.find_overlapping(from_ts, to_ts).await?;
                self.strategy.fill(from_ts, to_ts, &events);
                Ok(events)
            }
            Err(StrategyError::Cache(e)) => {
                warn!(error = %e, "bucket cache unavailable, falling back to durable store");
                let events = self.store.find_overlapping(from_ts, to_ts).await?;
                self.strategy.fill(from_ts, to_ts, &events);
                Ok(events)
            }
            Err(StrategyError::Durable(e)) => Err(SearchError::Store(e)),
        }
    }
}

//! Bucket cache strategy: month decomposition, partial-hit assembly, and
//! invalidation. Grounded on the cache-aside decorator pattern elsewhere
//! in the pack (check cache, fall back to the backing store on miss,
//! repopulate), generalized here to a per-month bucket instead of a
//! single-key entry.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use tracing::trace;

use crate::config::CacheConfig;
use crate::domain::Event;
use crate::error::CacheError;
use crate::store::DurableStore;

use super::fill::FillQueue;
use super::{Bucket, BucketStore};

/// The first day of every calendar month between `start` and `end`, inclusive.
pub fn months_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut months = Vec::new();
    let mut cursor = NaiveDate::from_ymd_opt(start.year(), start.month(), 1).unwrap();
    let last = NaiveDate::from_ymd_opt(end.year(), end.month(), 1).unwrap();
    loop {
        months.push(cursor);
        if cursor >= last {
            break;
        }
        cursor = next_month(cursor);
    }
    months
}

fn next_month(month: NaiveDate) -> NaiveDate {
    if month.month() == 12 {
        NaiveDate::from_ymd_opt(month.year() + 1, 1, 1).unwrap()
    } else {
        NaiveDate::from_ymd_opt(month.year(), month.month() + 1, 1).unwrap()
    }
}

/// Result of a strategy-level query: either a usable answer, or a signal
/// that the window is too wide for bucket lookups and should bypass
/// straight to the durable store.
#[derive(Debug)]
pub enum CacheOutcome {
    Hit(Vec<Event>),
    Bypass,
}

#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Durable(#[from] sqlx::Error),
}

pub struct BucketCacheStrategy {
    store: Arc<dyn BucketStore>,
    cfg: CacheConfig,
    fill_queue: FillQueue,
}

fn dedupe_and_sort(mut events: Vec<Event>) -> Vec<Event> {
    let mut seen = BTreeSet::new();
    events.retain(|e| seen.insert(e.id));
    events.sort_by(|a, b| (a.start_date, a.start_time, a.id).cmp(&(b.start_date, b.start_time, b.id)));
    events
}

impl BucketCacheStrategy {
    pub fn new(store: Arc<dyn BucketStore>, cfg: CacheConfig, fill_queue: FillQueue) -> Self {
        Self {
            store,
            cfg,
            fill_queue,
        }
    }

    pub async fn query(
        &self,
        from_ts: NaiveDateTime,
        to_ts: NaiveDateTime,
        durable: &dyn DurableStore,
    ) -> Result<CacheOutcome, StrategyError> {
        let months = months_between(from_ts.date(), to_ts.date());
        if months.len() > self.cfg.max_months_per_query {
            metrics::counter!("cache_misses_total").increment(1);
            return Ok(CacheOutcome::Bypass);
        }

        let mut cached: Vec<Event> = Vec::new();
        let mut missed_months: Vec<NaiveDate> = Vec::new();
        for month in &months {
            match self.store.get(*month).await {
                Ok(Some(bucket)) => cached.extend(bucket),
                Ok(None) => missed_months.push(*month),
                Err(e) => {
                    metrics::counter!("cache_errors_total").increment(1);
                    return Err(e.into());
                }
            }
        }

        if missed_months.is_empty() {
            metrics::counter!("cache_hits_total").increment(1);
            let filtered = cached.into_iter().filter(|e| e.overlaps(from_ts, to_ts)).collect();
            trace!(months = months.len(), "bucket cache full hit");
            return Ok(CacheOutcome::Hit(dedupe_and_sort(filtered)));
        }

        metrics::counter!("cache_misses_total").increment(1);

        let durable_events = durable.find_overlapping(from_ts, to_ts).await?;

        let missed_set: BTreeSet<NaiveDate> = missed_months.iter().copied().collect();
        let mut missed_bucketed: std::collections::HashMap<NaiveDate, Bucket> =
            missed_months.iter().map(|m| (*m, Vec::new())).collect();

        let mut result: Vec<Event> = cached
            .into_iter()
            .filter(|e| e.overlaps(from_ts, to_ts))
            .collect();

        for event in durable_events {
            // An event can touch several months; every missed month it
            // touches needs the event in its bucket, not just the month
            // it starts in (invariant I1).
            let touched_missed: Vec<NaiveDate> = event
                .touched_months()
                .into_iter()
                .filter(|m| missed_set.contains(m))
                .collect();
            if touched_missed.is_empty() {
                continue;
            }
            if event.overlaps(from_ts, to_ts) {
                result.push(event.clone());
            }
            for month in touched_missed {
                if let Some(bucket) = missed_bucketed.get_mut(&month) {
                    bucket.push(event.clone());
                }
            }
        }

        for (month, bucket) in missed_bucketed {
            self.fill_queue.dispatch(month, bucket);
        }

        Ok(CacheOutcome::Hit(dedupe_and_sort(result)))
    }

    /// Populates every bucket in `months_between(from_ts, to_ts)` from an
    /// already-fetched durable-store result. Used by the composer after a
    /// cache-bypass or cache-error fallback so a large query still warms
    /// the cache for a later, narrower one. Best-effort and non-blocking:
    /// dispatch onto the fill queue, never a direct write.
    pub fn fill(&self, from_ts: NaiveDateTime, to_ts: NaiveDateTime, events: &[Event]) {
        let months = months_between(from_ts.date(), to_ts.date());
        let mut bucketed: std::collections::HashMap<NaiveDate, Bucket> =
            months.iter().map(|m| (*m, Vec::new())).collect();

        for event in events {
            for month in event.touched_months() {
                if let Some(bucket) = bucketed.get_mut(&month) {
                    bucket.push(event.clone());
                }
            }
        }

        for (month, bucket) in bucketed {
            self.fill_queue.dispatch(month, bucket);
        }
    }

    /// Drop every bucket touched by any of `events`' `[start_date, end_date]`.
    pub async fn invalidate(&self, events: &[Event]) -> Result<(), CacheError> {
        let months: BTreeSet<NaiveDate> = events
            .iter()
            .flat_map(|e| months_between(e.start_date, e.end_date))
            .collect();
        for month in months {
            if self.store.delete(month).await? {
                metrics::counter!("cache_invalidations_total").increment(1);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::fake::FakeBucketStore;
    use crate::cache::fill::FillQueue;
    use crate::store::fake::FakeStore;
    use chrono::NaiveTime;
    use uuid::Uuid;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn months_between_single_month() {
        let months = months_between(d(2024, 12, 1), d(2024, 12, 31));
        assert_eq!(months, vec![d(2024, 12, 1)]);
    }

    #[test]
    fn months_between_spans_year_boundary() {
        let months = months_between(d(2024, 11, 15), d(2025, 1, 10));
        assert_eq!(months, vec![d(2024, 11, 1), d(2024, 12, 1), d(2025, 1, 1)]);
    }

    fn cache_cfg() -> CacheConfig {
        CacheConfig {
            key_prefix: "test:".to_string(),
            ttl_hours: 6,
            current_month_ttl_hours: 2,
            long_term_ttl_hours: 168,
            enable_tiered_ttl: true,
            max_months_per_query: 24,
            redis_url: "redis://localhost".to_string(),
            fill_queue_capacity: 16,
        }
    }

    #[tokio::test]
    async fn cross_month_event_lands_in_result_and_every_touched_bucket() {
        let spanning = Event::new(
            Uuid::new_v4(),
            "New Year's show".to_string(),
            d(2024, 11, 30),
            NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            d(2024, 12, 1),
            NaiveTime::from_hms_opt(2, 0, 0).unwrap(),
            10,
            20,
        )
        .unwrap();

        let durable = FakeStore::new();
        durable.seed(vec![spanning.clone()]);

        let bucket_store = Arc::new(FakeBucketStore::new());
        let (fill_queue, mut fill_rx) = FillQueue::new(16);
        let strategy = BucketCacheStrategy::new(bucket_store, cache_cfg(), fill_queue);

        let from = NaiveDateTime::new(d(2024, 11, 1), NaiveTime::from_hms_opt(0, 0, 0).unwrap());
        let to = NaiveDateTime::new(d(2024, 12, 31), NaiveTime::from_hms_opt(23, 59, 59).unwrap());

        let outcome = strategy.query(from, to, &durable).await.unwrap();
        let CacheOutcome::Hit(events) = outcome else {
            panic!("expected a hit");
        };
        assert_eq!(events.len(), 1);

        drop(strategy);
        let mut filled_months = Vec::new();
        while let Ok(job) = fill_rx.try_recv() {
            assert_eq!(job.bucket.len(), 1);
            filled_months.push(job.month);
        }
        filled_months.sort();
        assert_eq!(filled_months, vec![d(2024, 11, 1), d(2024, 12, 1)]);
    }
}

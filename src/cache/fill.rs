//! Bounded background queue for cache fill-back.
//!
//! The composer's critical path never waits on this: it enqueues a job and
//! returns. A full queue drops the job and logs rather than applying
//! backpressure to the reader — the next miss repopulates the bucket.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use tokio::sync::mpsc;
use tracing::warn;

use super::{Bucket, BucketStore};
use crate::config::CacheConfig;

pub struct FillJob {
    pub month: NaiveDate,
    pub bucket: Bucket,
}

#[derive(Clone)]
pub struct FillQueue {
    tx: mpsc::Sender<FillJob>,
}

impl FillQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<FillJob>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Best-effort: never blocks, never propagates failure to the caller.
    pub fn dispatch(&self, month: NaiveDate, bucket: Bucket) {
        match self.tx.try_send(FillJob { month, bucket }) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(%month, "fill queue full, dropping fill job");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(%month, "fill queue closed, dropping fill job");
            }
        }
    }
}

fn age_in_months(month: NaiveDate, now: NaiveDate) -> i32 {
    (now.year() - month.year()) * 12 + (now.month() as i32 - month.month() as i32)
}

/// Drains fill jobs onto the bucket store, applying the tiered TTL for each
/// month's age relative to the current month. Runs for the lifetime of the
/// process as a spawned task; exits when every `FillQueue` clone is dropped.
pub async fn run(
    mut rx: mpsc::Receiver<FillJob>,
    store: Arc<dyn BucketStore>,
    cfg: CacheConfig,
) {
    while let Some(job) = rx.recv().await {
        let now = chrono::Utc::now().date_naive();
        let age = age_in_months(job.month, now);
        let ttl: Duration = cfg.ttl_for_age(age);
        if let Err(e) = store.put(job.month, &job.bucket, ttl).await {
            warn!(error = %e, month = %job.month, "async bucket fill failed");
        }
    }
}

/// Periodically samples the bucket store's key count into the
/// `active_bucket_count` gauge. Runs for the lifetime of the process.
pub async fn sample_bucket_count(store: Arc<dyn BucketStore>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        match store.count().await {
            Ok(n) => metrics::gauge!("active_bucket_count").set(n as f64),
            Err(e) => warn!(error = %e, "failed to sample active bucket count"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_is_zero_for_current_month() {
        let m = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap();
        assert_eq!(age_in_months(m, m), 0);
    }

    #[test]
    fn age_counts_whole_months_back() {
        let now = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let m = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap();
        assert_eq!(age_in_months(m, now), 3);
    }
}

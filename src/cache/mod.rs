pub mod fill;
pub mod redis_store;
pub mod strategy;

pub use redis_store::RedisBucketStore;
pub use strategy::{BucketCacheStrategy, CacheOutcome, StrategyError};

use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;

use crate::domain::Event;
use crate::error::CacheError;

/// A cached snapshot of every event intersecting one calendar month.
pub type Bucket = Vec<Event>;

/// Month-keyed KV contract over the bucket cache's storage technology.
#[async_trait]
pub trait BucketStore: Send + Sync {
    async fn get(&self, month: NaiveDate) -> Result<Option<Bucket>, CacheError>;
    async fn put(&self, month: NaiveDate, bucket: &Bucket, ttl: Duration) -> Result<(), CacheError>;
    async fn delete(&self, month: NaiveDate) -> Result<bool, CacheError>;
    async fn count(&self) -> Result<u64, CacheError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct FakeBucketStore {
        buckets: Mutex<HashMap<NaiveDate, Bucket>>,
    }

    impl FakeBucketStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed(&self, month: NaiveDate, bucket: Bucket) {
            self.buckets.lock().insert(month, bucket);
        }
    }

    #[async_trait]
    impl BucketStore for FakeBucketStore {
        async fn get(&self, month: NaiveDate) -> Result<Option<Bucket>, CacheError> {
            Ok(self.buckets.lock().get(&month).cloned())
        }

        async fn put(&self, month: NaiveDate, bucket: &Bucket, _ttl: Duration) -> Result<(), CacheError> {
            self.buckets.lock().insert(month, bucket.clone());
            Ok(())
        }

        async fn delete(&self, month: NaiveDate) -> Result<bool, CacheError> {
            Ok(self.buckets.lock().remove(&month).is_some())
        }

        async fn count(&self) -> Result<u64, CacheError> {
            Ok(self.buckets.lock().len() as u64)
        }
    }
}

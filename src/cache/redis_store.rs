//! Redis-backed bucket store.
//!
//! Grounded on a `CacheService` elsewhere in the pack wrapping
//! `redis::aio::ConnectionManager`: the manager is cloned per call rather
//! than held behind a mutex, keys are namespaced, and values are
//! serde_json-encoded with graceful handling of decode failures.

use async_trait::async_trait;
use chrono::NaiveDate;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::warn;

use crate::error::CacheError;

use super::{Bucket, BucketStore};

pub struct RedisBucketStore {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisBucketStore {
    pub async fn connect(redis_url: &str, key_prefix: String) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn, key_prefix })
    }

    fn key(&self, month: NaiveDate) -> String {
        format!("{}{}", self.key_prefix, month.format("%Y-%m"))
    }
}

#[async_trait]
impl BucketStore for RedisBucketStore {
    async fn get(&self, month: NaiveDate) -> Result<Option<Bucket>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(self.key(month)).await?;
        match raw {
            None => Ok(None),
            Some(s) => match serde_json::from_str::<Bucket>(&s) {
                Ok(bucket) => Ok(Some(bucket)),
                Err(e) => {
                    warn!(error = %e, month = %month, "dropping undecodable bucket, treating as miss");
                    Ok(None)
                }
            },
        }
    }

    async fn put(&self, month: NaiveDate, bucket: &Bucket, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(bucket)?;
        conn.set_ex::<_, _, ()>(self.key(month), payload, ttl.as_secs())
            .await?;
        Ok(())
    }

    async fn delete(&self, month: NaiveDate) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let existed: i64 = conn.del(self.key(month)).await?;
        Ok(existed > 0)
    }

    /// Approximate: walks the keyspace with `SCAN` rather than `KEYS` so a
    /// large bucket set never blocks the server for the duration of a count.
    async fn count(&self) -> Result<u64, CacheError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", self.key_prefix);
        let mut iter: redis::AsyncIter<'_, String> = conn.scan_match(pattern).await?;
        let mut n = 0u64;
        while iter.next_item().await.is_some() {
            n += 1;
        }
        Ok(n)
    }
}

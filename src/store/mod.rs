pub mod postgres;

pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::domain::Event;

/// Outcome of a durable batch upsert: how many rows were inserted vs. updated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    pub inserted: usize,
    pub updated: usize,
}

/// The relational source of truth. See `PostgresStore` for the concrete
/// adapter; tests use an in-memory fake (`store::fake` in tests modules).
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn find_overlapping(
        &self,
        from_ts: NaiveDateTime,
        to_ts: NaiveDateTime,
    ) -> Result<Vec<Event>, sqlx::Error>;

    async fn upsert_batch(&self, events: &[Event]) -> Result<UpsertCounts, sqlx::Error>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// In-memory stand-in for `DurableStore`, keyed by content hash like the
    /// real adapter's unique index.
    #[derive(Default)]
    pub struct FakeStore {
        rows: Mutex<HashMap<String, Event>>,
    }

    impl FakeStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed(&self, events: impl IntoIterator<Item = Event>) {
            let mut rows = self.rows.lock();
            for e in events {
                rows.insert(e.content_hash(), e);
            }
        }
    }

    #[async_trait]
    impl DurableStore for FakeStore {
        async fn find_overlapping(
            &self,
            from_ts: NaiveDateTime,
            to_ts: NaiveDateTime,
        ) -> Result<Vec<Event>, sqlx::Error> {
            let rows = self.rows.lock();
            let mut out: Vec<Event> = rows
                .values()
                .filter(|e| e.overlaps(from_ts, to_ts))
                .cloned()
                .collect();
            out.sort_by(|a, b| {
                (a.start_date, a.start_time, a.id).cmp(&(b.start_date, b.start_time, b.id))
            });
            Ok(out)
        }

        async fn upsert_batch(&self, events: &[Event]) -> Result<UpsertCounts, sqlx::Error> {
            let mut rows = self.rows.lock();
            let mut sorted = events.to_vec();
            sorted.sort_by(|a, b| a.content_hash().cmp(&b.content_hash()));
            let mut counts = UpsertCounts::default();
            for mut e in sorted {
                let hash = e.content_hash();
                // Mirror the real store's `ON CONFLICT ... DO UPDATE`: the
                // original row's id always wins, never the incoming one.
                if let Some(existing) = rows.get(&hash) {
                    e.id = existing.id;
                    rows.insert(hash, e);
                    counts.updated += 1;
                } else {
                    rows.insert(hash, e);
                    counts.inserted += 1;
                }
            }
            Ok(counts)
        }
    }
}

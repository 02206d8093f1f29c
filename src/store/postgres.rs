//! Postgres-backed durable store.
//!
//! Grounded on the pool-construction and upsert idioms of a Postgres
//! storage adapter elsewhere in the pack: `PgPoolOptions` sizing, a
//! `CREATE TABLE IF NOT EXISTS` self-provisioning schema, and
//! `INSERT ... ON CONFLICT ... DO UPDATE` for dedup-by-hash writes.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::domain::Event;

use super::{DurableStore, UpsertCounts};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(cfg: &StoreConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .min_connections(cfg.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(cfg.acquire_timeout_secs))
            .connect(&cfg.database_url)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id UUID NOT NULL,
                event_hash TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                start_ts TIMESTAMP NOT NULL,
                end_ts TIMESTAMP NOT NULL,
                min_price BIGINT NOT NULL,
                max_price BIGINT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS events_start_ts_idx ON events (start_ts, id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS events_end_ts_idx ON events (end_ts)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_event(
        id: Uuid,
        title: String,
        start_ts: NaiveDateTime,
        end_ts: NaiveDateTime,
        min_price: i64,
        max_price: i64,
    ) -> Option<Event> {
        Event::new(
            id,
            title,
            start_ts.date(),
            start_ts.time(),
            end_ts.date(),
            end_ts.time(),
            min_price,
            max_price,
        )
        .ok()
    }
}

#[async_trait]
impl DurableStore for PostgresStore {
    async fn find_overlapping(
        &self,
        from_ts: NaiveDateTime,
        to_ts: NaiveDateTime,
    ) -> Result<Vec<Event>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, start_ts, end_ts, min_price, max_price
            FROM events
            WHERE start_ts <= $2 AND end_ts >= $1
            ORDER BY start_ts ASC, id ASC
            "#,
        )
        .bind(from_ts)
        .bind(to_ts)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(event) = Self::row_to_event(
                row.try_get("id")?,
                row.try_get("title")?,
                row.try_get("start_ts")?,
                row.try_get("end_ts")?,
                row.try_get("min_price")?,
                row.try_get("max_price")?,
            ) {
                events.push(event);
            }
        }
        Ok(events)
    }

    async fn upsert_batch(&self, events: &[Event]) -> Result<UpsertCounts, sqlx::Error> {
        let mut sorted: Vec<&Event> = events.iter().collect();
        sorted.sort_by_key(|e| e.content_hash());

        let mut tx = self.pool.begin().await?;
        let mut counts = UpsertCounts::default();

        for event in sorted {
            let row = sqlx::query(
                r#"
                INSERT INTO events (id, event_hash, title, start_ts, end_ts, min_price, max_price, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, now())
                ON CONFLICT (event_hash) DO UPDATE SET
                    title = EXCLUDED.title,
                    start_ts = EXCLUDED.start_ts,
                    end_ts = EXCLUDED.end_ts,
                    min_price = EXCLUDED.min_price,
                    max_price = EXCLUDED.max_price,
                    updated_at = now()
                RETURNING (xmax = 0) AS inserted
                "#,
            )
            .bind(event.id)
            .bind(event.content_hash())
            .bind(&event.title)
            .bind(event.start_ts())
            .bind(event.end_ts())
            .bind(event.min_price)
            .bind(event.max_price)
            .fetch_one(&mut *tx)
            .await?;

            if row.try_get::<bool, _>("inserted")? {
                counts.inserted += 1;
            } else {
                counts.updated += 1;
            }
        }

        tx.commit().await?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use chrono::{NaiveDate, NaiveTime};

    fn test_cfg(database_url: String) -> StoreConfig {
        StoreConfig {
            database_url,
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_secs: 5,
        }
    }

    fn event(title: &str, min_price: i64, max_price: i64) -> Event {
        Event::new(
            Uuid::new_v4(),
            title.to_string(),
            NaiveDate::from_ymd_opt(2024, 12, 15).unwrap(),
            NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 15).unwrap(),
            NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
            min_price,
            max_price,
        )
        .unwrap()
    }

    // Set DATABASE_URL to enable. Example:
    // DATABASE_URL=postgres://localhost/events_marketplace_test cargo test
    #[tokio::test]
    #[ignore = "requires PostgreSQL (set DATABASE_URL to enable)"]
    async fn reupsert_with_changed_price_preserves_id() {
        let url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set for integration tests");
        let store = PostgresStore::connect(&test_cfg(url)).await.unwrap();

        let original = event("ConcertMadrid", 10, 20);
        store.upsert_batch(&[original.clone()]).await.unwrap();

        let mut repriced = event("ConcertMadrid", 15, 30);
        repriced.id = Uuid::new_v4();
        assert_eq!(repriced.content_hash(), original.content_hash());
        let counts = store.upsert_batch(&[repriced.clone()]).await.unwrap();
        assert_eq!(counts.updated, 1);

        let found = store
            .find_overlapping(original.start_ts(), original.end_ts())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, original.id);
        assert_eq!(found[0].min_price, 15);
        assert_eq!(found[0].max_price, 30);
    }
}

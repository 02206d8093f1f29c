//! Event model and business-key hashing.
//!
//! An `Event` is the domain record this service ingests, caches, and
//! serves. Its content hash — not its id — is the key the durable store
//! deduplicates on, so the same upstream event re-seen across syncs
//! collapses onto one row.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use xxhash_rust::xxh64::xxh64;

/// Separator byte between hash-forming fields.
///
/// Unit separator (0x1F) cannot appear in any realistic event title,
/// so concatenating fields with it can't create boundary ambiguity
/// (e.g. title "A" + start "B" colliding with title "AB" + start "").
const HASH_FIELD_SEP: u8 = 0x1F;

/// Fixed seed so the digest is stable across processes and platforms.
const HASH_SEED: u64 = 0;

/// An online event intersecting some span of calendar time.
///
/// Immutable once constructed: mutation happens by replacing the whole
/// value (see the durable store's upsert semantics), never in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_date: NaiveDate,
    pub end_time: NaiveTime,
    pub min_price: i64,
    pub max_price: i64,
}

/// Error returned when constructing an `Event` that violates its invariants.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventError {
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("start must be <= end")]
    InvertedRange,
    #[error("prices must be non-negative with min_price <= max_price")]
    InvalidPrice,
}

impl Event {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        title: String,
        start_date: NaiveDate,
        start_time: NaiveTime,
        end_date: NaiveDate,
        end_time: NaiveTime,
        min_price: i64,
        max_price: i64,
    ) -> Result<Self, EventError> {
        if title.trim().is_empty() {
            return Err(EventError::EmptyTitle);
        }
        if (start_date, start_time) > (end_date, end_time) {
            return Err(EventError::InvertedRange);
        }
        if min_price < 0 || max_price < 0 || min_price > max_price {
            return Err(EventError::InvalidPrice);
        }
        Ok(Self {
            id,
            title,
            start_date,
            start_time,
            end_date,
            end_time,
            min_price,
            max_price,
        })
    }

    pub fn start_ts(&self) -> NaiveDateTime {
        NaiveDateTime::new(self.start_date, self.start_time)
    }

    pub fn end_ts(&self) -> NaiveDateTime {
        NaiveDateTime::new(self.end_date, self.end_time)
    }

    /// True if this event's interval intersects `[from, to]` (closed on both ends).
    pub fn overlaps(&self, from: NaiveDateTime, to: NaiveDateTime) -> bool {
        self.start_ts() <= to && self.end_ts() >= from
    }

    /// Stable business-key digest over the hash-forming fields only.
    ///
    /// `id`, `min_price`, and `max_price` are deliberately excluded: two
    /// events that differ only in price or id are the same business
    /// event and must collapse to one durable row.
    pub fn content_hash(&self) -> String {
        let mut buf = Vec::with_capacity(self.title.len() + 48);
        buf.extend_from_slice(self.title.as_bytes());
        buf.push(HASH_FIELD_SEP);
        buf.extend_from_slice(self.start_date.format("%Y-%m-%d").to_string().as_bytes());
        buf.push(HASH_FIELD_SEP);
        buf.extend_from_slice(self.start_time.format("%H:%M:%S").to_string().as_bytes());
        buf.push(HASH_FIELD_SEP);
        buf.extend_from_slice(self.end_date.format("%Y-%m-%d").to_string().as_bytes());
        buf.push(HASH_FIELD_SEP);
        buf.extend_from_slice(self.end_time.format("%H:%M:%S").to_string().as_bytes());

        format!("{:016x}", xxh64(&buf, HASH_SEED))
    }

    /// The first day of every calendar month this event's interval touches.
    pub fn touched_months(&self) -> Vec<NaiveDate> {
        crate::cache::strategy::months_between(self.start_date, self.end_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(title: &str, min_price: i64, max_price: i64) -> Event {
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

    #[test]
    fn hash_ignores_id_and_price() {
        let a = sample("ConcertMadrid", 25, 100);
        let b = sample("ConcertMadrid", 30, 120);
        assert_ne!(a.id, b.id);
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn hash_is_deterministic() {
        let a = sample("ConcertMadrid", 25, 100);
        assert_eq!(a.content_hash(), a.content_hash());
    }

    #[test]
    fn hash_differs_on_title() {
        let a = sample("ConcertMadrid", 25, 100);
        let b = sample("TheaterShow", 25, 100);
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn rejects_empty_title() {
        let err = Event::new(
            Uuid::new_v4(),
            "".to_string(),
            NaiveDate::from_ymd_opt(2024, 12, 15).unwrap(),
            NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 15).unwrap(),
            NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
            0,
            0,
        )
        .unwrap_err();
        assert_eq!(err, EventError::EmptyTitle);
    }

    #[test]
    fn rejects_inverted_range() {
        let err = Event::new(
            Uuid::new_v4(),
            "X".to_string(),
            NaiveDate::from_ymd_opt(2024, 12, 15).unwrap(),
            NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 15).unwrap(),
            NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            0,
            0,
        )
        .unwrap_err();
        assert_eq!(err, EventError::InvertedRange);
    }

    #[test]
    fn overlap_predicate_matches_closed_interval() {
        let e = sample("X", 0, 0);
        let from = NaiveDateTime::new(
            NaiveDate::from_ymd_opt(2024, 12, 15).unwrap(),
            NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
        );
        let to = NaiveDateTime::new(
            NaiveDate::from_ymd_opt(2024, 12, 16).unwrap(),
            NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
        );
        assert!(e.overlaps(from, to));

        let from2 = NaiveDateTime::new(
            NaiveDate::from_ymd_opt(2024, 12, 16).unwrap(),
            NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
        );
        let to2 = NaiveDateTime::new(
            NaiveDate::from_ymd_opt(2024, 12, 17).unwrap(),
            NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
        );
        assert!(!e.overlaps(from2, to2));
    }
}

//! HTTP surface: a single range-search endpoint plus a liveness probe.

use axum::extract::{Query, State as AxumState};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::Event;
use crate::AppState;

const QUERY_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub starts_at: String,
    pub ends_at: String,
}

#[derive(Debug, Serialize)]
pub struct EventDto {
    pub id: String,
    pub title: String,
    pub start_date: String,
    pub start_time: String,
    pub end_date: String,
    pub end_time: String,
    pub min_price: String,
    pub max_price: String,
}

impl From<&Event> for EventDto {
    fn from(e: &Event) -> Self {
        Self {
            id: e.id.to_string(),
            title: e.title.clone(),
            start_date: e.start_date.format("%Y-%m-%d").to_string(),
            start_time: e.start_time.format("%H:%M:%S").to_string(),
            end_date: e.end_date.format("%Y-%m-%d").to_string(),
            end_time: e.end_time.format("%H:%M:%S").to_string(),
            min_price: format!("{:.2}", e.min_price as f64 / 100.0),
            max_price: format!("{:.2}", e.max_price as f64 / 100.0),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventsEnvelope {
    pub events: Vec<EventDto>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub data: EventsEnvelope,
}

fn empty_response() -> Json<SearchResponse> {
    Json(SearchResponse {
        data: EventsEnvelope { events: vec![] },
    })
}

fn parse_query_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, QUERY_DATETIME_FORMAT).ok()
}

pub async fn search(
    Query(params): Query<SearchQuery>,
    AxumState(state): AxumState<AppState>,
) -> axum::response::Response {
    use axum::response::IntoResponse;

    let (Some(from_ts), Some(to_ts)) = (
        parse_query_datetime(&params.starts_at),
        parse_query_datetime(&params.ends_at),
    ) else {
        return (StatusCode::BAD_REQUEST, empty_response()).into_response();
    };

    match state.composer.search(from_ts, to_ts).await {
        Ok(events) => {
            let dtos = events.iter().map(EventDto::from).collect();
            Json(SearchResponse {
                data: EventsEnvelope { events: dtos },
            })
            .into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_datetime_parses_iso_local() {
        let parsed = parse_query_datetime("2024-12-15T20:00:00");
        assert!(parsed.is_some());
    }

    #[test]
    fn query_datetime_rejects_garbage() {
        assert!(parse_query_datetime("not-a-date").is_none());
    }
}

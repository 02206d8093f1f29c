//! Error taxonomy.
//!
//! Validation errors are client-visible, transient downstream errors are
//! contained and degrade gracefully, and only a durable-store failure at
//! the composer boundary becomes a 500.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("bucket store transport error: {0}")]
    Transport(#[from] redis::RedisError),
    #[error("bucket serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("upstream transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream decode error: {0}")]
    Decode(#[from] quick_xml::de::DeError),
    #[error("circuit breaker open")]
    BreakerOpen,
    #[error("request timed out")]
    Timeout,
}

/// Errors the range query composer can return to its caller.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("starts_at must be <= ends_at")]
    InvalidRange,
    #[error("durable store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl IntoResponse for SearchError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            SearchError::InvalidRange => StatusCode::BAD_REQUEST,
            SearchError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Both error cases return the same empty envelope.
        (status, Json(json!({ "data": { "events": [] } }))).into_response()
    }
}

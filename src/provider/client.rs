//! HTTP-backed provider client: timeout, retry with exponential backoff,
//! and a circuit breaker, in that outer-to-inner order.
//!
//! The retry loop follows the `execute_with_retry` idiom used for the
//! other upstream scraper in this codebase: a bounded attempt loop,
//! `tokio::time::timeout` around the send, and a doubling backoff capped
//! at 30s. The breaker wraps the whole loop so a trip fails the request
//! fast without spending a retry budget on it.

use std::time::Duration;

use async_trait::async_trait;
use quick_xml::de::from_str;
use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::config::ProviderConfig;
use crate::domain::Event;
use crate::error::ProviderError;

use super::breaker::CircuitBreaker;
use super::mapper::map_plan_list;
use super::xml::PlanList;
use super::EventProvider;

pub struct ProviderClient {
    http: reqwest::Client,
    cfg: ProviderConfig,
    breaker: CircuitBreaker,
}

impl ProviderClient {
    pub fn new(cfg: ProviderConfig) -> Self {
        let breaker = CircuitBreaker::new(cfg.breaker.clone());
        Self {
            http: reqwest::Client::new(),
            cfg,
            breaker,
        }
    }

    async fn fetch_once(&self) -> Result<String, ProviderError> {
        let mut backoff = self.cfg.retry.initial_backoff();
        let url = format!("{}/api/events", self.cfg.base_url.trim_end_matches('/'));
        let started = std::time::Instant::now();

        for attempt in 0..self.cfg.retry.max_attempts {
            let request = self.http.get(&url).send();

            match timeout(self.cfg.timeout(), request).await {
                Ok(Ok(response)) if response.status().is_success() => {
                    metrics::histogram!("provider_fetch_duration_seconds")
                        .record(started.elapsed().as_secs_f64());
                    return response.text().await.map_err(ProviderError::Transport);
                }
                Ok(Ok(response)) => {
                    warn!(status = %response.status(), attempt, "provider returned non-success status");
                }
                Ok(Err(e)) => {
                    warn!(error = %e, attempt, "provider request failed");
                }
                Err(_) => {
                    warn!(attempt, "provider request timed out");
                }
            }

            if attempt + 1 < self.cfg.retry.max_attempts {
                sleep(backoff).await;
                backoff = Duration::from_secs_f64(
                    (backoff.as_secs_f64() * self.cfg.retry.multiplier).min(30.0),
                );
            }
        }

        metrics::histogram!("provider_fetch_duration_seconds").record(started.elapsed().as_secs_f64());
        Err(ProviderError::Timeout)
    }
}

#[async_trait]
impl EventProvider for ProviderClient {
    async fn fetch_online_events(&self) -> Result<Vec<Event>, ProviderError> {
        if !self.breaker.is_call_permitted() {
            return Err(ProviderError::BreakerOpen);
        }

        match self.fetch_once().await {
            Ok(body) => {
                let plan_list: PlanList = match from_str(&body) {
                    Ok(p) => p,
                    Err(e) => {
                        self.breaker.on_failure();
                        return Err(ProviderError::Decode(e));
                    }
                };
                self.breaker.on_success();
                Ok(map_plan_list(&plan_list))
            }
            Err(e) => {
                self.breaker.on_failure();
                Err(e)
            }
        }
    }
}

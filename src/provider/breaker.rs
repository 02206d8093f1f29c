//! Explicit circuit breaker state machine for the provider client.
//!
//! A call-count sliding window is used rather than a time window, so this
//! is hand-rolled instead of reached for off the shelf:
//! Closed tallies the last `window` outcomes and trips once at least
//! `min_calls` have been seen and the failure rate clears `threshold_pct`;
//! Open fails fast until `open_duration` elapses; Half-Open admits a
//! limited number of probe calls and closes on the first success or
//! re-opens on the first failure.

use std::collections::VecDeque;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::BreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: BreakerState,
    outcomes: VecDeque<bool>,
    opened_at: Option<Instant>,
    half_open_probes_remaining: usize,
}

pub struct CircuitBreaker {
    cfg: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(cfg: BreakerConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                outcomes: VecDeque::with_capacity(cfg.window),
                opened_at: None,
                half_open_probes_remaining: 0,
            }),
            cfg,
        }
    }

    /// Whether a call is allowed right now. Transitions Open -> HalfOpen
    /// once the open window has elapsed.
    pub fn is_call_permitted(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => inner.half_open_probes_remaining > 0,
            BreakerState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed() >= self.cfg.open_duration())
                    .unwrap_or(false);
                if elapsed {
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_probes_remaining = self.cfg.min_calls.min(3).max(1);
                    info!("circuit breaker transitioning to half-open");
                    metrics::counter!("breaker_transitions_total", "state" => "half_open").increment(1);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn on_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                info!("circuit breaker closing after successful probe");
                inner.state = BreakerState::Closed;
                inner.outcomes.clear();
                inner.opened_at = None;
                metrics::counter!("breaker_transitions_total", "state" => "closed").increment(1);
            }
            BreakerState::Closed => {
                push_outcome(&mut inner.outcomes, true, self.cfg.window);
            }
            BreakerState::Open => {}
        }
    }

    pub fn on_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                warn!("circuit breaker re-opening after failed probe");
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                metrics::counter!("breaker_transitions_total", "state" => "open").increment(1);
            }
            BreakerState::Closed => {
                push_outcome(&mut inner.outcomes, false, self.cfg.window);
                if inner.outcomes.len() >= self.cfg.min_calls {
                    let failures = inner.outcomes.iter().filter(|ok| !**ok).count();
                    let failure_pct = (failures * 100) / inner.outcomes.len();
                    if failure_pct >= self.cfg.threshold_pct as usize {
                        warn!(failure_pct, "circuit breaker tripping open");
                        inner.state = BreakerState::Open;
                        inner.opened_at = Some(Instant::now());
                        metrics::counter!("breaker_transitions_total", "state" => "open").increment(1);
                    }
                }
            }
            BreakerState::Open => {}
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }
}

fn push_outcome(outcomes: &mut VecDeque<bool>, ok: bool, window: usize) {
    outcomes.push_back(ok);
    while outcomes.len() > window {
        outcomes.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> BreakerConfig {
        BreakerConfig {
            window: 10,
            threshold_pct: 50,
            min_calls: 5,
            open_ms: 30_000,
        }
    }

    #[test]
    fn stays_closed_below_min_calls() {
        let breaker = CircuitBreaker::new(cfg());
        for _ in 0..4 {
            breaker.on_failure();
        }
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.is_call_permitted());
    }

    #[test]
    fn trips_open_at_threshold() {
        let breaker = CircuitBreaker::new(cfg());
        for _ in 0..5 {
            breaker.on_failure();
        }
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.is_call_permitted());
    }

    #[test]
    fn mixed_outcomes_below_threshold_stay_closed() {
        let breaker = CircuitBreaker::new(cfg());
        for _ in 0..3 {
            breaker.on_success();
        }
        for _ in 0..2 {
            breaker.on_failure();
        }
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}

//! Periodic scheduler driving the sync pipeline on a fixed interval.
//!
//! Grounded on the poll-loop shape of a calendar poller elsewhere in the
//! pack (`tokio::time::sleep` in a loop, spawned once at startup);
//! generalized to `tokio::time::interval` plus an explicit non-overlap
//! guard. Each tick's `sync_once` runs on its own spawned task so a panic
//! inside it surfaces as a `JoinError` rather than taking down the
//! scheduler loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::sync::SyncPipeline;

pub struct Scheduler {
    pipeline: Arc<SyncPipeline>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(pipeline: Arc<SyncPipeline>, interval: Duration) -> Self {
        Self {
            pipeline,
            interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawns the driver loop. Ticks that land while a `sync_once` is still
    /// running are dropped rather than queued.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;

                if self
                    .running
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    warn!("previous sync still running, dropping this tick");
                    continue;
                }

                let pipeline = self.pipeline.clone();
                let running = self.running.clone();
                tokio::spawn(async move {
                    let result = tokio::spawn(async move { pipeline.sync_once().await }).await;
                    running.store(false, Ordering::Release);
                    if let Err(e) = result {
                        error!(error = %e, "sync_once task panicked, scheduler resuming at next tick");
                    }
                });
            }
        })
    }
}

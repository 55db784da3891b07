//! Feeds the routing worker pool from the queue and from expired leases.

use lm_03_lead_routing::RoutingWorkerPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

pub struct DispatchHandler {
    pool: Arc<RoutingWorkerPool>,
    interval: Duration,
    batch: usize,
}

impl DispatchHandler {
    pub fn new(pool: Arc<RoutingWorkerPool>, interval: Duration, batch: usize) -> Self {
        Self {
            pool,
            interval,
            batch: batch.max(1),
        }
    }

    /// Submits pending queue entries and reclaimed leases. Returns how many
    /// leads went to the pool.
    pub async fn tick(&self) -> usize {
        let pending = match self.pool.dispatch_pending(self.batch).await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, kind = ?e.kind(), "Pending dispatch failed");
                0
            }
        };
        let reclaimed = match self.pool.sweep_stale_leases().await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, kind = ?e.kind(), "Stale lease sweep failed");
                0
            }
        };
        pending + reclaimed
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            batch = self.batch,
            "Routing dispatch started"
        );
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    info!("Routing dispatch stopped");
                    return;
                }
            }
        }
    }
}

//! Periodic trigger for the offer scheduler.

use lm_04_offer_lifecycle::{OfferSchedulerApi, SweepReport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Calls `run_once` every `interval`. A slow sweep delays the next tick
/// instead of stacking runs.
pub struct SchedulerHandler {
    scheduler: Arc<dyn OfferSchedulerApi>,
    interval: Duration,
}

impl SchedulerHandler {
    pub fn new(scheduler: Arc<dyn OfferSchedulerApi>, interval: Duration) -> Self {
        Self {
            scheduler,
            interval,
        }
    }

    pub async fn tick(&self) -> SweepReport {
        let report = self.scheduler.run_once().await;
        if !report.errors.is_empty() {
            warn!(
                errors = report.errors.total(),
                reminders = report.reminders_sent,
                expired = report.offers_expired,
                "Scheduler sweep finished with errors"
            );
        } else if report.is_idle() {
            debug!("Scheduler sweep idle");
        } else {
            info!(
                reminders = report.reminders_sent,
                expired = report.offers_expired,
                requeued = report.leads_requeued,
                queue_purged = report.queue_rows_purged,
                dedupe_purged = report.dedupe_rows_purged,
                "Scheduler sweep finished"
            );
        }
        report
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "Offer scheduler trigger started");
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    info!("Offer scheduler trigger stopped");
                    return;
                }
            }
        }
    }
}

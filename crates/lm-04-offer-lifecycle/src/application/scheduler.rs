//! # Offer Scheduler
//!
//! Stateless sweeps over offers and transient bookkeeping rows. Every sweep
//! is a single conditional bulk transition in the store, so re-running it
//! or running two copies at once changes nothing the first run already did.

use async_trait::async_trait;
use shared_bus::{EventPublisher, MarketplaceEvent, NoopPublisher, OfferSnapshot};
use shared_types::entities::{LeadId, Timestamp};
use shared_types::errors::ErrorKind;
use shared_types::time::TimeSource;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::follow_up::FollowUp;
use crate::config::LifecycleConfig;
use crate::domain::{LifecycleError, StepReport, SweepReport};
use crate::ports::{DedupeLogCleaner, LifecycleStores, OfferSchedulerApi};

/// Offer Scheduler - implementation of [`OfferSchedulerApi`].
pub struct OfferScheduler {
    config: LifecycleConfig,
    stores: LifecycleStores,
    dedupe_log: Option<Arc<dyn DedupeLogCleaner>>,
    publisher: Arc<dyn EventPublisher>,
    time_source: Arc<dyn TimeSource>,
}

impl OfferScheduler {
    pub fn new(
        config: LifecycleConfig,
        stores: LifecycleStores,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            config,
            stores,
            dedupe_log: None,
            publisher: Arc::new(NoopPublisher::default()),
            time_source,
        }
    }

    pub fn with_dedupe_log(mut self, dedupe_log: Arc<dyn DedupeLogCleaner>) -> Self {
        self.dedupe_log = Some(dedupe_log);
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    fn follow_up(&self) -> FollowUp<'_> {
        FollowUp {
            stores: &self.stores,
            policy: self.config.expiry_policy,
            publisher: self.publisher.as_ref(),
        }
    }

    fn log_step(step: &'static str, report: &StepReport) {
        if report.affected > 0 || !report.errors.is_empty() {
            info!(
                step,
                affected = report.affected,
                requeued = report.requeued,
                errors = report.errors.total(),
                "Sweep step finished"
            );
        } else {
            debug!(step, "Sweep step idle");
        }
    }

    async fn requeue_exhausted(
        &self,
        leads: BTreeSet<LeadId>,
        now: Timestamp,
        report: &mut StepReport,
    ) {
        let follow_up = self.follow_up();
        for lead_id in leads {
            match follow_up.apply(lead_id, now).await {
                Ok(true) => report.requeued += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(lead_id = %lead_id, error = %e, "Skipping lead follow-up");
                    report.errors.record(e.kind());
                }
            }
        }
    }
}

#[async_trait]
impl OfferSchedulerApi for OfferScheduler {
    async fn process_expiring_offers(&self) -> Result<StepReport, LifecycleError> {
        let now = self.time_source.now();
        let due = self
            .stores
            .matches
            .claim_due_reminders(now, self.config.reminder_window_ms)
            .await?;

        for offer in &due {
            debug!(
                match_id = %offer.id,
                provider_id = %offer.provider_id,
                expires_at = offer.expires_at,
                "Reminder due"
            );
            self.publisher
                .publish(MarketplaceEvent::OfferReminderDue(OfferSnapshot::from(offer)))
                .await;
        }

        let report = StepReport::affected(due.len() as u64);
        Self::log_step("process_expiring_offers", &report);
        Ok(report)
    }

    async fn process_expired_offers(&self) -> Result<StepReport, LifecycleError> {
        let now = self.time_source.now();
        let expired = self.stores.matches.expire_due_offers(now).await?;

        let mut leads = BTreeSet::new();
        for offer in &expired {
            leads.insert(offer.lead_id);
            self.publisher
                .publish(MarketplaceEvent::OfferExpired(OfferSnapshot::from(offer)))
                .await;
        }

        let mut report = StepReport::affected(expired.len() as u64);
        self.requeue_exhausted(leads, now, &mut report).await;
        Self::log_step("process_expired_offers", &report);
        Ok(report)
    }

    async fn cleanup_routing_queue(&self) -> Result<StepReport, LifecycleError> {
        let cutoff = self
            .time_source
            .now()
            .saturating_sub(self.config.queue_retention_ms);
        let purged = self.stores.queue.purge_completed_before(cutoff).await?;

        let report = StepReport::affected(purged);
        Self::log_step("cleanup_routing_queue", &report);
        Ok(report)
    }

    async fn cleanup_dedupe_log(&self) -> Result<StepReport, LifecycleError> {
        let Some(dedupe_log) = &self.dedupe_log else {
            debug!("No dedupe log attached");
            return Ok(StepReport::default());
        };
        let cutoff = self
            .time_source
            .now()
            .saturating_sub(self.config.dedupe_retention_ms);
        let purged = dedupe_log
            .purge_before(cutoff)
            .await
            .map_err(LifecycleError::DedupeLog)?;

        let report = StepReport::affected(purged);
        Self::log_step("cleanup_dedupe_log", &report);
        Ok(report)
    }

    async fn run_once(&self) -> SweepReport {
        fn step(
            name: &'static str,
            result: Result<StepReport, LifecycleError>,
        ) -> Result<StepReport, ErrorKind> {
            result.map_err(|e| {
                warn!(step = name, error = %e, "Sweep step failed");
                e.kind()
            })
        }

        let mut report = SweepReport::default();
        report.reminders_sent = report.absorb(
            step("process_expiring_offers", self.process_expiring_offers().await),
        );
        report.offers_expired = report.absorb(
            step("process_expired_offers", self.process_expired_offers().await),
        );
        report.queue_rows_purged = report.absorb(
            step("cleanup_routing_queue", self.cleanup_routing_queue().await),
        );
        report.dedupe_rows_purged = report.absorb(
            step("cleanup_dedupe_log", self.cleanup_dedupe_log().await),
        );

        if report.is_idle() {
            debug!("Sweep idle");
        } else {
            info!(
                reminders_sent = report.reminders_sent,
                offers_expired = report.offers_expired,
                leads_requeued = report.leads_requeued,
                queue_rows_purged = report.queue_rows_purged,
                dedupe_rows_purged = report.dedupe_rows_purged,
                errors = report.errors.total(),
                "Sweep finished"
            );
        }
        report
    }
}

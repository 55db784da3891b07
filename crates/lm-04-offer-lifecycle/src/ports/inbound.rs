//! # Inbound Ports

use async_trait::async_trait;
use shared_types::entities::{Match, MatchId, ProviderId};

use crate::domain::{AcceptReceipt, LifecycleError, StepReport, SweepReport};

/// Scheduler API - four independent, idempotent sweeps.
///
/// Each sweep is a conditional bulk transition, so overlapping invocations
/// never change the same row twice.
#[async_trait]
pub trait OfferSchedulerApi: Send + Sync {
    /// Claims active, unreminded offers inside the reminder window and emits
    /// one reminder per offer.
    async fn process_expiring_offers(&self) -> Result<StepReport, LifecycleError>;

    /// Expires active offers past `expires_at` and applies the expiry policy
    /// to the affected leads.
    async fn process_expired_offers(&self) -> Result<StepReport, LifecycleError>;

    /// Purges completed routing queue rows past retention.
    async fn cleanup_routing_queue(&self) -> Result<StepReport, LifecycleError>;

    /// Purges dedupe log entries past retention.
    async fn cleanup_dedupe_log(&self) -> Result<StepReport, LifecycleError>;

    /// Runs all four sweeps. A failing sweep is counted and the rest still run.
    async fn run_once(&self) -> SweepReport;
}

/// Offer Desk API - the provider-facing acceptance flow.
#[async_trait]
pub trait OfferDeskApi: Send + Sync {
    async fn offer(&self, match_id: MatchId) -> Result<Match, LifecycleError>;

    /// `offered → viewed`. Viewing a viewed offer is a no-op.
    async fn view(&self, match_id: MatchId, provider_id: ProviderId)
        -> Result<Match, LifecycleError>;

    /// Charges the provider the offer price and records the sale.
    async fn accept(
        &self,
        match_id: MatchId,
        provider_id: ProviderId,
    ) -> Result<AcceptReceipt, LifecycleError>;

    async fn decline(
        &self,
        match_id: MatchId,
        provider_id: ProviderId,
        reason: Option<&str>,
    ) -> Result<Match, LifecycleError>;

    /// Returns the acceptance charge to the provider.
    async fn refund(&self, match_id: MatchId, reason: &str) -> Result<Match, LifecycleError>;
}

//! Inbound (Driving) ports for the Lead Routing subsystem.

use async_trait::async_trait;
use shared_types::entities::{LeadId, WorkerId};

use crate::domain::{RoutingError, RoutingOutcome};

/// Routing entry points used by the worker pool and by external triggers.
#[async_trait]
pub trait LeadRoutingApi: Send + Sync {
    /// Claims and routes one lead.
    ///
    /// Losing a claim race is `Ok(RoutingOutcome::Skipped(_))`, not an error.
    /// Transient failures are absorbed into `Retrying` or `DeadLettered`;
    /// only unexpected failures surface as `Err`.
    async fn route(&self, lead_id: LeadId, worker: &WorkerId)
        -> Result<RoutingOutcome, RoutingError>;

    /// Leads whose routing lease expired without the owner finishing.
    async fn reclaimable_leads(&self) -> Result<Vec<LeadId>, RoutingError>;

    /// Oldest pending queue entries, at most `limit`.
    async fn pending_leads(&self, limit: usize) -> Result<Vec<LeadId>, RoutingError>;
}

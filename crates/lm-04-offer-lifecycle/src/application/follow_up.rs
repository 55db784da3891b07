//! Applies the expiry policy to a lead whose offers changed.

use shared_bus::{EventPublisher, MarketplaceEvent};
use shared_types::entities::{LeadId, Timestamp};
use tracing::{debug, info};

use crate::domain::{ExpiryPolicy, LifecycleError};
use crate::ports::LifecycleStores;

pub(crate) struct FollowUp<'a> {
    pub stores: &'a LifecycleStores,
    pub policy: ExpiryPolicy,
    pub publisher: &'a dyn EventPublisher,
}

impl FollowUp<'_> {
    /// Returns whether the lead was sent back to the routing queue.
    pub async fn apply(&self, lead_id: LeadId, now: Timestamp) -> Result<bool, LifecycleError> {
        if self.policy == ExpiryPolicy::NoFollowUp {
            return Ok(false);
        }
        let lead = self
            .stores
            .leads
            .get_lead(lead_id)
            .await?
            .ok_or(LifecycleError::LeadNotFound(lead_id))?;
        let offers = self.stores.matches.matches_for_lead(lead_id).await?;
        if !self.policy.should_requeue(&lead, &offers) {
            return Ok(false);
        }

        // Guarded on routed/partial, so a concurrent follow-up loses here
        if !self.stores.leads.requeue_lead(lead_id).await? {
            debug!(lead_id = %lead_id, "Lead already requeued");
            return Ok(false);
        }
        self.stores.queue.enqueue(lead.tenant_id, lead_id, now).await?;

        let requeue_count = lead.requeue_count + 1;
        self.publisher
            .publish(MarketplaceEvent::LeadRequeued {
                tenant_id: lead.tenant_id,
                lead_id,
                requeue_count,
            })
            .await;
        info!(lead_id = %lead_id, requeue_count, "Lead requeued after offers ran out");
        Ok(true)
    }
}

//! Follow-up policy for leads whose offers ran out.

use serde::{Deserialize, Serialize};
use shared_types::entities::{LeadRequest, LeadStatus, Match, MatchStatus};

/// Decides whether a lead goes back for another routing pass after its
/// offers expire or are declined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryPolicy {
    /// Leave the lead as it is.
    #[default]
    NoFollowUp,
    /// Requeue a lead that has no active and no accepted offers left, at most
    /// `max_requeues` times over its lifetime.
    RequeueWhenExhausted { max_requeues: u32 },
}

impl ExpiryPolicy {
    pub fn should_requeue(&self, lead: &LeadRequest, offers: &[Match]) -> bool {
        let Self::RequeueWhenExhausted { max_requeues } = *self else {
            return false;
        };
        if !matches!(lead.status, LeadStatus::Routed | LeadStatus::Partial) {
            return false;
        }
        if lead.requeue_count >= max_requeues || lead.is_sold_out() {
            return false;
        }
        !offers
            .iter()
            .any(|m| m.is_active() || m.status == MatchStatus::Accepted)
    }
}

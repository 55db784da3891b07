//! # Marketplace Events
//!
//! Every event that flows through the shared bus. The Notification
//! Dispatcher is simply a subscriber; the core never delivers messages.

use serde::{Deserialize, Serialize};
use shared_types::entities::{
    LeadId, LeadStatus, Match, MatchId, Money, ProviderId, RoutingReason, TenantId, Timestamp,
};

/// All events that can be published to the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketplaceEvent {
    // =========================================================================
    // LEAD ROUTING
    // =========================================================================
    /// An offer was created for a provider.
    OfferCreated(OfferSnapshot),

    /// A lead finished its routing pass.
    LeadRouted {
        tenant_id: TenantId,
        lead_id: LeadId,
        status: LeadStatus,
        reason: Option<RoutingReason>,
        matches_created: u32,
    },

    /// A lead exhausted its retry budget.
    LeadDeadLettered {
        tenant_id: TenantId,
        lead_id: LeadId,
        attempts: u32,
    },

    /// A lead was sent back for another routing pass.
    LeadRequeued {
        tenant_id: TenantId,
        lead_id: LeadId,
        requeue_count: u32,
    },

    // =========================================================================
    // OFFER LIFECYCLE
    // =========================================================================
    /// An offer is close to expiry and its provider should be nudged.
    OfferReminderDue(OfferSnapshot),

    /// An offer timed out or was closed because the lead sold out.
    OfferExpired(OfferSnapshot),

    OfferViewed(OfferSnapshot),

    /// A provider accepted and was charged.
    OfferAccepted {
        offer: OfferSnapshot,
        charged: Money,
        ledger_sequence: u64,
    },

    OfferDeclined {
        offer: OfferSnapshot,
        reason: Option<String>,
    },

    OfferRefunded {
        offer: OfferSnapshot,
        refunded: Money,
        reason: String,
    },
}

/// The fields of a match that subscribers need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferSnapshot {
    pub match_id: MatchId,
    pub tenant_id: TenantId,
    pub lead_id: LeadId,
    pub provider_id: ProviderId,
    pub price: Money,
    pub expires_at: Timestamp,
}

impl From<&Match> for OfferSnapshot {
    fn from(m: &Match) -> Self {
        Self {
            match_id: m.id,
            tenant_id: m.tenant_id,
            lead_id: m.lead_id,
            provider_id: m.provider_id,
            price: m.price,
            expires_at: m.expires_at,
        }
    }
}

impl MarketplaceEvent {
    /// Get the topic for this event.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::OfferCreated(_)
            | Self::LeadRouted { .. }
            | Self::LeadDeadLettered { .. }
            | Self::LeadRequeued { .. } => EventTopic::Routing,

            Self::OfferReminderDue(_)
            | Self::OfferExpired(_)
            | Self::OfferViewed(_)
            | Self::OfferAccepted { .. }
            | Self::OfferDeclined { .. }
            | Self::OfferRefunded { .. } => EventTopic::Offers,
        }
    }

    /// Component that emits this event.
    #[must_use]
    pub fn source(&self) -> &'static str {
        match self {
            Self::OfferCreated(_)
            | Self::LeadRouted { .. }
            | Self::LeadDeadLettered { .. } => "lead-routing",
            Self::OfferReminderDue(_) | Self::OfferExpired(_) | Self::LeadRequeued { .. } => {
                "offer-scheduler"
            }
            Self::OfferViewed(_)
            | Self::OfferAccepted { .. }
            | Self::OfferDeclined { .. }
            | Self::OfferRefunded { .. } => "offer-desk",
        }
    }

    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        match self {
            Self::OfferCreated(o)
            | Self::OfferReminderDue(o)
            | Self::OfferExpired(o)
            | Self::OfferViewed(o) => o.tenant_id,
            Self::OfferAccepted { offer, .. }
            | Self::OfferDeclined { offer, .. }
            | Self::OfferRefunded { offer, .. } => offer.tenant_id,
            Self::LeadRouted { tenant_id, .. }
            | Self::LeadDeadLettered { tenant_id, .. }
            | Self::LeadRequeued { tenant_id, .. } => *tenant_id,
        }
    }
}

/// Event topics for filtering subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Routing outcomes and new offers.
    Routing,
    /// Offer state changes driven by the scheduler or the provider.
    Offers,
    /// Subscribe to everything.
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Tenants to include. Empty means all tenants.
    pub tenants: Vec<TenantId>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            tenants: Vec::new(),
        }
    }

    /// Restrict the filter to a set of tenants.
    #[must_use]
    pub fn for_tenants(mut self, tenants: Vec<TenantId>) -> Self {
        self.tenants = tenants;
        self
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &MarketplaceEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let tenant_match = self.tenants.is_empty() || self.tenants.contains(&event.tenant_id());

        topic_match && tenant_match
    }
}

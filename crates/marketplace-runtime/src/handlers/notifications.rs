//! # Notification Logger
//!
//! Stand-in for the notification dispatcher. Turns bus events into provider
//! notices, picks channels from the provider's preferences, and logs them.

use marketplace_store::InMemoryProviderCatalog;
use shared_bus::{MarketplaceEvent, Subscription};
use shared_types::entities::{ProviderId, TenantId};
use std::sync::Arc;
use tracing::{debug, info};

/// Who to tell and what about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub tenant_id: TenantId,
    pub provider_id: ProviderId,
    pub template: &'static str,
}

impl Notice {
    /// Provider-facing notice for `event`. Routing bookkeeping events
    /// produce none.
    pub fn for_event(event: &MarketplaceEvent) -> Option<Self> {
        let (offer, template) = match event {
            MarketplaceEvent::OfferCreated(offer) => (offer, "new_offer"),
            MarketplaceEvent::OfferReminderDue(offer) => (offer, "offer_expiring"),
            MarketplaceEvent::OfferExpired(offer) => (offer, "offer_expired"),
            MarketplaceEvent::OfferAccepted { offer, .. } => (offer, "offer_charged"),
            MarketplaceEvent::OfferRefunded { offer, .. } => (offer, "offer_refunded"),
            MarketplaceEvent::OfferViewed(_)
            | MarketplaceEvent::OfferDeclined { .. }
            | MarketplaceEvent::LeadRouted { .. }
            | MarketplaceEvent::LeadDeadLettered { .. }
            | MarketplaceEvent::LeadRequeued { .. } => return None,
        };
        Some(Self {
            tenant_id: offer.tenant_id,
            provider_id: offer.provider_id,
            template,
        })
    }
}

pub struct NotificationLogger {
    subscription: Subscription,
    catalog: Arc<InMemoryProviderCatalog>,
}

impl NotificationLogger {
    pub fn new(subscription: Subscription, catalog: Arc<InMemoryProviderCatalog>) -> Self {
        Self {
            subscription,
            catalog,
        }
    }

    /// Channels the provider opted into. Unknown providers get email.
    pub fn channels(&self, notice: &Notice) -> Vec<&'static str> {
        let Some(profile) = self.catalog.provider(notice.tenant_id, notice.provider_id) else {
            return vec!["email"];
        };
        let mut channels = Vec::new();
        if profile.preferences.notify_email {
            channels.push("email");
        }
        if profile.preferences.notify_sms {
            channels.push("sms");
        }
        channels
    }

    fn deliver(&self, event: &MarketplaceEvent) {
        let Some(notice) = Notice::for_event(event) else {
            debug!(source = event.source(), topic = ?event.topic(), "Event needs no notice");
            return;
        };
        let channels = self.channels(&notice);
        if channels.is_empty() {
            debug!(provider_id = %notice.provider_id, template = notice.template, "Provider muted notices");
            return;
        }
        info!(
            tenant_id = %notice.tenant_id,
            provider_id = %notice.provider_id,
            template = notice.template,
            channels = ?channels,
            "Notification queued"
        );
    }

    /// Runs until the bus closes.
    pub async fn run(mut self) {
        info!("Notification logger started");
        while let Some(event) = self.subscription.recv().await {
            self.deliver(&event);
        }
        info!("Event bus closed, notification logger stopped");
    }
}

//! # Offer Desk
//!
//! The provider-facing side of an offer: view, accept, decline, refund.
//!
//! Acceptance reserves lead capacity before charging, so two providers racing
//! for the last slot cannot both pay. Every step that follows a charge undoes
//! it if the offer turns out to have changed underneath.

use async_trait::async_trait;
use shared_bus::{EventPublisher, MarketplaceEvent, NoopPublisher, OfferSnapshot};
use shared_types::entities::{Match, MatchId, MatchStatus, MatchUpdate, ProviderId, Timestamp};
use shared_types::ports::SaleOutcome;
use shared_types::time::TimeSource;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::follow_up::FollowUp;
use crate::config::LifecycleConfig;
use crate::domain::{AcceptReceipt, LifecycleError};
use crate::ports::{GatewayError, LedgerGateway, LifecycleStores, OfferDeskApi};

const OPEN: &[MatchStatus] = &[MatchStatus::Offered, MatchStatus::Viewed];

/// Offer Desk - implementation of [`OfferDeskApi`].
pub struct OfferDesk {
    config: LifecycleConfig,
    stores: LifecycleStores,
    ledger: Arc<dyn LedgerGateway>,
    publisher: Arc<dyn EventPublisher>,
    time_source: Arc<dyn TimeSource>,
}

impl OfferDesk {
    pub fn new(
        config: LifecycleConfig,
        stores: LifecycleStores,
        ledger: Arc<dyn LedgerGateway>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            config,
            stores,
            ledger,
            publisher: Arc::new(NoopPublisher::default()),
            time_source,
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    fn follow_up(&self) -> FollowUp<'_> {
        FollowUp {
            stores: &self.stores,
            policy: self.config.expiry_policy,
            publisher: self.publisher.as_ref(),
        }
    }

    async fn load(&self, match_id: MatchId) -> Result<Match, LifecycleError> {
        self.stores
            .matches
            .get_match(match_id)
            .await?
            .ok_or(LifecycleError::OfferNotFound(match_id))
    }

    /// Loads an offer the provider owns that is still open.
    async fn load_open(
        &self,
        match_id: MatchId,
        provider_id: ProviderId,
        now: Timestamp,
    ) -> Result<Match, LifecycleError> {
        let offer = self.load(match_id).await?;
        if offer.provider_id != provider_id {
            return Err(LifecycleError::NotOwner {
                match_id,
                provider_id,
            });
        }
        if !offer.is_active() {
            return Err(LifecycleError::InvalidTransition {
                match_id,
                status: offer.status,
            });
        }
        if offer.is_expired_at(now) {
            self.expire_in_place(&offer, now).await?;
            return Err(LifecycleError::OfferExpired(match_id));
        }
        Ok(offer)
    }

    /// Expires an offer the sweep has not reached yet.
    async fn expire_in_place(&self, offer: &Match, now: Timestamp) -> Result<(), LifecycleError> {
        let expired = self
            .stores
            .matches
            .transition(offer.id, OPEN, MatchUpdate::to(MatchStatus::Expired, now))
            .await?;
        if let Some(expired) = expired {
            debug!(match_id = %expired.id, "Offer expired on access");
            self.publisher
                .publish(MarketplaceEvent::OfferExpired(OfferSnapshot::from(&expired)))
                .await;
            self.apply_follow_up(&expired, now).await;
        }
        Ok(())
    }

    async fn apply_follow_up(&self, offer: &Match, now: Timestamp) {
        if let Err(e) = self.follow_up().apply(offer.lead_id, now).await {
            warn!(lead_id = %offer.lead_id, error = %e, "Lead follow-up failed");
        }
    }

    /// Gives back capacity reserved by a failed acceptance.
    async fn revert_sale(&self, offer: &Match) {
        if let Err(e) = self.stores.leads.revert_sale(offer.lead_id).await {
            warn!(lead_id = %offer.lead_id, error = %e, "Failed to revert sale");
        }
    }

    /// Closes every other open offer once the lead is sold out.
    async fn close_remaining(&self, offer: &Match, now: Timestamp) -> u32 {
        match self
            .stores
            .matches
            .expire_active_for_lead(offer.lead_id, now)
            .await
        {
            Ok(closed) => {
                for other in &closed {
                    self.publisher
                        .publish(MarketplaceEvent::OfferExpired(OfferSnapshot::from(other)))
                        .await;
                }
                closed.len() as u32
            }
            Err(e) => {
                // The sweep closes them at expiry instead
                warn!(lead_id = %offer.lead_id, error = %e, "Failed to close remaining offers");
                0
            }
        }
    }
}

#[async_trait]
impl OfferDeskApi for OfferDesk {
    async fn offer(&self, match_id: MatchId) -> Result<Match, LifecycleError> {
        self.load(match_id).await
    }

    async fn view(
        &self,
        match_id: MatchId,
        provider_id: ProviderId,
    ) -> Result<Match, LifecycleError> {
        let now = self.time_source.now();
        let offer = self.load_open(match_id, provider_id, now).await?;
        if offer.status == MatchStatus::Viewed {
            return Ok(offer);
        }

        match self
            .stores
            .matches
            .transition(
                match_id,
                &[MatchStatus::Offered],
                MatchUpdate::to(MatchStatus::Viewed, now),
            )
            .await?
        {
            Some(viewed) => {
                self.publisher
                    .publish(MarketplaceEvent::OfferViewed(OfferSnapshot::from(&viewed)))
                    .await;
                Ok(viewed)
            }
            // Lost a race; report whatever won
            None => {
                let current = self.load(match_id).await?;
                if current.status == MatchStatus::Viewed {
                    Ok(current)
                } else {
                    Err(LifecycleError::InvalidTransition {
                        match_id,
                        status: current.status,
                    })
                }
            }
        }
    }

    async fn accept(
        &self,
        match_id: MatchId,
        provider_id: ProviderId,
    ) -> Result<AcceptReceipt, LifecycleError> {
        let now = self.time_source.now();
        let offer = self.load_open(match_id, provider_id, now).await?;

        let sold_out = match self.stores.leads.record_sale(offer.lead_id).await? {
            SaleOutcome::Sold {
                sold_count,
                max_sold_count,
            } => sold_count >= max_sold_count,
            SaleOutcome::SoldOut => return Err(LifecycleError::SoldOut(offer.lead_id)),
        };

        let reason = format!("lead {} offer {}", offer.lead_id, offer.id);
        let sequence = match self.ledger.charge(provider_id, offer.price, &reason).await {
            Ok(sequence) => sequence,
            Err(e) => {
                self.revert_sale(&offer).await;
                return Err(match e {
                    GatewayError::InsufficientFunds { balance, requested } => {
                        debug!(
                            match_id = %match_id,
                            provider_id = %provider_id,
                            %balance,
                            %requested,
                            "Acceptance declined for funds"
                        );
                        LifecycleError::InsufficientFunds {
                            provider_id,
                            balance,
                            requested,
                        }
                    }
                    other => LifecycleError::Ledger(other),
                });
            }
        };

        let accepted = self
            .stores
            .matches
            .transition(
                match_id,
                OPEN,
                MatchUpdate::to(MatchStatus::Accepted, now).with_charge(sequence),
            )
            .await;
        let accepted = match accepted {
            Ok(Some(accepted)) => accepted,
            failed => {
                // The offer moved on between load and write; undo the charge
                if let Err(e) = self
                    .ledger
                    .refund(provider_id, sequence, "acceptance rolled back")
                    .await
                {
                    warn!(match_id = %match_id, sequence, error = %e, "Rollback refund failed");
                }
                self.revert_sale(&offer).await;
                return Err(match failed {
                    Err(e) => e.into(),
                    _ => {
                        let status = self.load(match_id).await?.status;
                        LifecycleError::InvalidTransition { match_id, status }
                    }
                });
            }
        };

        let closed_offers = if sold_out {
            self.close_remaining(&accepted, now).await
        } else {
            0
        };

        self.publisher
            .publish(MarketplaceEvent::OfferAccepted {
                offer: OfferSnapshot::from(&accepted),
                charged: accepted.price,
                ledger_sequence: sequence,
            })
            .await;
        info!(
            match_id = %match_id,
            lead_id = %accepted.lead_id,
            provider_id = %provider_id,
            price = %accepted.price,
            sold_out,
            closed_offers,
            "Offer accepted"
        );

        Ok(AcceptReceipt {
            charged: accepted.price,
            offer: accepted,
            ledger_sequence: sequence,
            sold_out,
            closed_offers,
        })
    }

    async fn decline(
        &self,
        match_id: MatchId,
        provider_id: ProviderId,
        reason: Option<&str>,
    ) -> Result<Match, LifecycleError> {
        let now = self.time_source.now();
        let offer = self.load_open(match_id, provider_id, now).await?;

        let mut update = MatchUpdate::to(MatchStatus::Declined, now);
        if let Some(reason) = reason {
            update = update.with_reason(reason);
        }
        let Some(declined) = self.stores.matches.transition(match_id, OPEN, update).await? else {
            let status = self.load(match_id).await?.status;
            return Err(LifecycleError::InvalidTransition { match_id, status });
        };

        self.publisher
            .publish(MarketplaceEvent::OfferDeclined {
                offer: OfferSnapshot::from(&declined),
                reason: declined.decline_reason.clone(),
            })
            .await;
        info!(match_id = %match_id, lead_id = %offer.lead_id, provider_id = %provider_id, "Offer declined");

        self.apply_follow_up(&declined, now).await;
        Ok(declined)
    }

    async fn refund(&self, match_id: MatchId, reason: &str) -> Result<Match, LifecycleError> {
        let now = self.time_source.now();
        let offer = self.load(match_id).await?;
        let (MatchStatus::Accepted, Some(sequence)) = (offer.status, offer.charge_reference) else {
            return Err(LifecycleError::InvalidTransition {
                match_id,
                status: offer.status,
            });
        };

        // The ledger rejects a second refund of the same charge
        self.ledger
            .refund(offer.provider_id, sequence, reason)
            .await
            .map_err(LifecycleError::Ledger)?;

        let refunded = self
            .stores
            .matches
            .transition(
                match_id,
                &[MatchStatus::Accepted],
                MatchUpdate::to(MatchStatus::Refunded, now),
            )
            .await?
            .ok_or(LifecycleError::InvalidTransition {
                match_id,
                status: offer.status,
            })?;
        self.revert_sale(&refunded).await;

        self.publisher
            .publish(MarketplaceEvent::OfferRefunded {
                offer: OfferSnapshot::from(&refunded),
                refunded: refunded.price,
                reason: reason.to_string(),
            })
            .await;
        info!(
            match_id = %match_id,
            provider_id = %refunded.provider_id,
            amount = %refunded.price,
            "Offer refunded"
        );
        Ok(refunded)
    }
}

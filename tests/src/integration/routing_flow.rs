//! # Routing Flow
//!
//! Lead intake through the wired container: validation, dedupe, the
//! eligibility filters, capacity, pricing, and the events routing emits.

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use shared_bus::{EventFilter, EventTopic, MarketplaceEvent};
    use shared_types::entities::{
        BudgetRange, LeadLocation, LeadStatus, MatchStatus, PricingRule, ProviderId,
        ProviderPreferences, QueueStatus, RoutingReason, TimingPreference, MS_PER_HOUR,
    };
    use shared_types::ports::RoutingQueueRepository;

    use crate::harness::{lead, north, origin, provider, Marketplace, SERVICE, T0, TENANT};

    // =========================================================================
    // ELIGIBILITY
    // =========================================================================

    #[tokio::test]
    async fn test_budget_below_provider_minimum_excludes_provider() {
        let market = Marketplace::new();
        let cheap = ProviderPreferences {
            min_budget: Some(dec!(50)),
            ..ProviderPreferences::default()
        };
        let premium = ProviderPreferences {
            min_budget: Some(dec!(600)),
            ..ProviderPreferences::default()
        };
        market
            .add_provider(provider(1, north(2.0), 25.0).with_preferences(cheap), dec!(100))
            .await;
        market
            .add_provider(provider(2, north(1.0), 25.0).with_preferences(premium), dec!(100))
            .await;

        let request = lead(1).with_budget(BudgetRange::new(None, Some(dec!(500))));
        let outcome = market.submit_and_route(request).await;
        let report = outcome.report().unwrap();
        assert_eq!(report.status, LeadStatus::Routed);
        assert_eq!(report.matches_created, 1);

        let offers = market.offers(report.lead_id).await;
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].provider_id, ProviderId(1));
    }

    #[tokio::test]
    async fn test_offers_stay_within_effective_radius() {
        let market = Marketplace::new();
        let capped = ProviderPreferences {
            max_radius_km: Some(25.0),
            ..ProviderPreferences::default()
        };
        market.add_provider(provider(1, north(5.0), 10.0), dec!(50)).await;
        market.add_provider(provider(2, north(20.0), 10.0), dec!(50)).await;
        market
            .add_provider(provider(3, north(30.0), 50.0).with_preferences(capped), dec!(50))
            .await;
        market.add_provider(provider(4, north(8.0), 10.0), dec!(50)).await;

        let outcome = market.submit_and_route(lead(1).with_max_sold_count(5)).await;
        let report = outcome.report().unwrap();
        assert_eq!(report.candidates_considered, 4);
        assert_eq!(report.exclusions.total(), 2);

        let mut offers = market.offers(report.lead_id).await;
        offers.sort_by_key(|m| m.provider_id);
        let providers: Vec<_> = offers.iter().map(|m| m.provider_id).collect();
        assert_eq!(providers, vec![ProviderId(1), ProviderId(4)]);
        for offer in &offers {
            assert!(offer.distance_km <= 10.0, "{} km", offer.distance_km);
        }
        assert!((offers[0].distance_km - 5.0).abs() < 0.05);
    }

    #[tokio::test]
    async fn test_unfunded_provider_is_skipped_and_routing_continues() {
        let market = Marketplace::new();
        market.add_provider(provider(1, origin(), 20.0), dec!(0)).await;
        market.add_provider(provider(2, north(3.0), 20.0), dec!(10)).await;

        let outcome = market.submit_and_route(lead(1)).await;
        let report = outcome.report().unwrap();
        assert_eq!(report.matches_created, 1);
        assert_eq!(report.exclusions.total(), 1);
        assert_eq!(market.offers(report.lead_id).await[0].provider_id, ProviderId(2));
    }

    #[tokio::test]
    async fn test_capacity_takes_the_nearest_providers() {
        let market = Marketplace::new();
        for (id, km) in [(1, 9.0), (2, 1.0), (3, 7.0), (4, 3.0), (5, 5.0)] {
            market.add_provider(provider(id, north(km), 20.0), dec!(40)).await;
        }

        let outcome = market.submit_and_route(lead(1)).await;
        let report = outcome.report().unwrap();
        assert_eq!(report.eligible, 5);
        assert_eq!(report.matches_created, 3);

        let mut providers: Vec<_> = market
            .offers(report.lead_id)
            .await
            .iter()
            .map(|m| m.provider_id.0)
            .collect();
        providers.sort_unstable();
        assert_eq!(providers, vec![2, 4, 5]);
    }

    // =========================================================================
    // VALIDATION AND DEDUPE
    // =========================================================================

    #[tokio::test]
    async fn test_empty_service_set_is_partial_without_offers() {
        let market = Marketplace::new();
        market.add_provider(provider(1, origin(), 20.0), dec!(40)).await;

        let mut request = lead(1);
        request.service_ids.clear();
        let id = market.submit(request).await;
        let outcome = market.route(id).await;
        assert_eq!(outcome.matches_created(), 0);

        let stored = market.lead(id).await;
        assert_eq!(stored.status, LeadStatus::Partial);
        assert_eq!(stored.status_reason, Some(RoutingReason::NoServices));
        assert!(market.offers(id).await.is_empty());

        let queue = market.container.store.queue_entries();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].status, QueueStatus::Completed);
        assert!(market.container.store.pending(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resubmission_in_same_day_bucket_is_duplicate() {
        let market = Marketplace::new();
        market.add_provider(provider(1, origin(), 20.0), dec!(40)).await;

        let first = lead(1);
        let mut second = lead(2);
        second.contact = first.contact.clone();
        second.created_at = T0 + MS_PER_HOUR;
        let mut next_day = lead(3);
        next_day.contact = first.contact.clone();
        next_day.created_at = T0 + 3 * MS_PER_HOUR;

        assert_eq!(market.submit_and_route(first).await.matches_created(), 1);

        let duplicate = market.submit_and_route(second).await;
        let report = duplicate.report().unwrap();
        assert_eq!(report.status, LeadStatus::Partial);
        assert_eq!(report.reason, Some(RoutingReason::Duplicate));
        assert!(market.offers(report.lead_id).await.is_empty());

        // T0 is 22:13 UTC, so three hours later is the next bucket
        let later = market.submit_and_route(next_day).await;
        assert_eq!(later.report().unwrap().status, LeadStatus::Routed);
    }

    #[tokio::test]
    async fn test_postal_code_is_geocoded_from_the_catalog() {
        let market = Marketplace::new();
        market.add_provider(provider(1, origin(), 20.0), dec!(40)).await;
        market.catalog().add_postal_code(TENANT, "78701", origin());

        let mut known = lead(1);
        known.location = LeadLocation::postal("78 701");
        let outcome = market.submit_and_route(known).await;
        assert_eq!(outcome.report().unwrap().status, LeadStatus::Routed);

        let mut unknown = lead(2);
        unknown.location = LeadLocation::postal("99999");
        let id = market.submit(unknown).await;
        market.route(id).await;
        let stored = market.lead(id).await;
        assert_eq!(stored.status, LeadStatus::Partial);
        assert_eq!(stored.status_reason, Some(RoutingReason::MissingLocation));
    }

    // =========================================================================
    // PRICING AND EVENTS
    // =========================================================================

    #[tokio::test]
    async fn test_matching_rule_prices_every_offer() {
        let market = Marketplace::new();
        market.add_provider(provider(1, origin(), 20.0), dec!(500)).await;
        market.add_provider(provider(2, north(2.0), 20.0), dec!(500)).await;

        let mut rule = PricingRule::for_service(1, TENANT, SERVICE, dec!(40));
        rule.surge_multiplier = dec!(1.5);
        market.catalog().add_pricing_rule(rule);

        let urgent = lead(1).with_timing(TimingPreference::Asap).exclusive();
        let outcome = market.submit_and_route(urgent).await;
        let report = outcome.report().unwrap();
        assert_eq!(report.price, Some(dec!(180.00)));
        for offer in market.offers(report.lead_id).await {
            assert_eq!(offer.price, dec!(180.00));
            assert_eq!(offer.status, MatchStatus::Offered);
        }

        let flexible = market.submit_and_route(lead(2)).await;
        assert_eq!(flexible.report().unwrap().price, Some(dec!(40.00)));
    }

    #[tokio::test]
    async fn test_routing_publishes_offers_then_outcome() {
        let market = Marketplace::new();
        market.add_provider(provider(1, origin(), 20.0), dec!(40)).await;
        market.add_provider(provider(2, north(1.0), 20.0), dec!(40)).await;
        let mut sub = market
            .container
            .event_bus
            .subscribe(EventFilter::topics(vec![EventTopic::Routing]));

        market.submit_and_route(lead(1)).await;

        let events = sub.drain();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], MarketplaceEvent::OfferCreated(_)));
        assert!(matches!(events[1], MarketplaceEvent::OfferCreated(_)));
        match &events[2] {
            MarketplaceEvent::LeadRouted {
                status,
                matches_created,
                ..
            } => {
                assert_eq!(*status, LeadStatus::Routed);
                assert_eq!(*matches_created, 2);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}

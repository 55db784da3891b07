//! # Concurrency
//!
//! Races the engine has to survive on a multi-threaded runtime: workers
//! claiming the same lead, providers double-clicking accept, overlapping
//! scheduler passes and parallel wallet debits.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::join_all;
    use lm_01_wallet_ledger::{WalletApi, WalletError};
    use lm_03_lead_routing::{LeadRoutingApi, RoutingOutcome, SkipReason};
    use lm_04_offer_lifecycle::{OfferDeskApi, OfferSchedulerApi};
    use marketplace_runtime::{MarketplaceContainer, MarketplaceRuntime, RuntimeConfig};
    use marketplace_store::InMemoryProviderCatalog;
    use rust_decimal_macros::dec;
    use shared_bus::{EventFilter, EventTopic, MarketplaceEvent};
    use shared_types::entities::{LeadStatus, MatchStatus, ProviderId, WorkerId};
    use shared_types::ports::{LeadRepository, MatchRepository};
    use shared_types::time::ManualTimeSource;

    use crate::harness::{lead, north, origin, provider, Marketplace, T0};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_workers_route_a_lead_once() {
        let market = Marketplace::new();
        market.add_provider(provider(1, origin(), 20.0), dec!(100)).await;
        market.add_provider(provider(2, north(1.0), 20.0), dec!(100)).await;
        let id = market.submit(lead(1)).await;

        let workers = ["worker-a", "worker-b", "worker-c", "worker-d"];
        let passes = workers.into_iter().map(|name| {
            let routing = market.container.routing.clone();
            tokio::spawn(async move { routing.route(id, &WorkerId::new(name)).await })
        });
        let outcomes: Vec<RoutingOutcome> = join_all(passes)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        let completed = outcomes
            .iter()
            .filter(|o| matches!(o, RoutingOutcome::Completed(_)))
            .count();
        assert_eq!(completed, 1);
        for outcome in outcomes.iter().filter(|o| o.is_noop()) {
            assert!(matches!(
                outcome,
                RoutingOutcome::Skipped(SkipReason::Busy | SkipReason::NotClaimable(_))
            ));
        }
        assert_eq!(market.offers(id).await.len(), 2);
        assert_eq!(market.lead(id).await.status, LeadStatus::Routed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_repeated_accept_charges_once() {
        let market = Marketplace::new();
        market.add_provider(provider(1, origin(), 20.0), dec!(500)).await;
        let outcome = market.submit_and_route(lead(1)).await;
        let lead_id = outcome.report().unwrap().lead_id;
        let offer = market.offers(lead_id).await[0].clone();

        let clicks = (0..8).map(|_| {
            let desk = market.container.desk.clone();
            tokio::spawn(async move { desk.accept(offer.id, offer.provider_id).await })
        });
        let results: Vec<_> = join_all(clicks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(market.balance(ProviderId(1)).await, dec!(475.00));
        assert_eq!(market.lead(lead_id).await.sold_count, 1);

        let stored = market.container.desk.offer(offer.id).await.unwrap();
        assert_eq!(stored.status, MatchStatus::Accepted);

        // Losing attempts may have charged and rolled back; the net is one sale
        let wallet = market.container.wallet.wallet(ProviderId(1)).await.unwrap();
        assert_eq!(wallet.lifetime_spent - wallet.lifetime_refunded, dec!(25.00));
        market
            .container
            .wallet
            .verify_chain(ProviderId(1))
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_sweeps_expire_each_offer_once() {
        let market = Marketplace::new();
        for (id, km) in [(1, 1.0), (2, 2.0), (3, 3.0)] {
            market.add_provider(provider(id, north(km), 20.0), dec!(100)).await;
        }
        let outcome = market.submit_and_route(lead(1)).await;
        assert_eq!(outcome.matches_created(), 3);
        let mut sub = market
            .container
            .event_bus
            .subscribe(EventFilter::topics(vec![EventTopic::Offers]));

        let expires_at = market.offers(outcome.report().unwrap().lead_id).await[0].expires_at;
        market.set_time(expires_at + 1);

        let sweeps = (0..4).map(|_| {
            let scheduler = market.container.scheduler.clone();
            tokio::spawn(async move { scheduler.run_once().await })
        });
        let reports: Vec<_> = join_all(sweeps)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let expired: u64 = reports.iter().map(|r| r.offers_expired).sum();
        assert_eq!(expired, 3);
        assert!(reports.iter().all(|r| r.errors.is_empty()));

        let expiry_events = sub
            .drain()
            .into_iter()
            .filter(|e| matches!(e, MarketplaceEvent::OfferExpired(_)))
            .count();
        assert_eq!(expiry_events, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_debits_never_overdraw() {
        let market = Marketplace::new();
        market.add_provider(provider(1, origin(), 20.0), dec!(100)).await;

        let debits = (0..20).map(|i| {
            let wallet = market.container.wallet.clone();
            tokio::spawn(async move {
                wallet
                    .debit(ProviderId(1), dec!(10), &format!("debit {i}"))
                    .await
            })
        });
        let results: Vec<_> = join_all(debits)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 10);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(matches!(err, WalletError::InsufficientFunds { .. }));
        }
        assert_eq!(market.balance(ProviderId(1)).await, dec!(0));
        market
            .container
            .wallet
            .verify_chain(ProviderId(1))
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_worker_pool_routes_a_burst_of_leads() {
        let clock = Arc::new(ManualTimeSource::new(T0));
        let catalog = Arc::new(InMemoryProviderCatalog::new());
        let container =
            MarketplaceContainer::assemble(RuntimeConfig::for_testing(), catalog.clone(), clock);
        for (id, km) in [(1, 0.5), (2, 1.5), (3, 2.5), (4, 3.5)] {
            catalog.upsert_provider(provider(id, north(km), 20.0));
            container
                .wallet
                .purchase(ProviderId(id), dec!(1000), None)
                .await
                .unwrap();
        }

        let runtime = MarketplaceRuntime::new(container);
        let submissions = (1..=24).map(|id| runtime.submit_lead(lead(id)));
        let ids: Vec<_> = join_all(submissions)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert!(runtime.wait_idle(Duration::from_secs(10)).await);

        let container = runtime.container();
        for id in ids {
            let stored = container.store.get_lead(id).await.unwrap().unwrap();
            assert_eq!(stored.status, LeadStatus::Routed, "lead {id}");

            let offers = container.store.matches_for_lead(id).await.unwrap();
            assert_eq!(offers.len(), 3, "lead {id}");
            let mut providers: Vec<_> = offers.iter().map(|m| m.provider_id.0).collect();
            providers.sort_unstable();
            assert_eq!(providers, vec![1, 2, 3]);
        }
        runtime.shutdown().await;
    }
}

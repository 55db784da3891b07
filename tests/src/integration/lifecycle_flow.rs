//! # Lifecycle Flow
//!
//! Offers after routing: the reminder and expiry sweeps on a one-minute
//! cadence, acceptance billing, refunds, and the requeue policy.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use lm_01_wallet_ledger::{TransactionKind, WalletApi, WalletError};
    use lm_04_offer_lifecycle::{ExpiryPolicy, LifecycleError, OfferDeskApi};
    use marketplace_runtime::RuntimeConfig;
    use rust_decimal_macros::dec;
    use shared_bus::{EventFilter, EventTopic, MarketplaceEvent};
    use shared_types::entities::{
        LeadStatus, MatchId, MatchStatus, ProviderId, MS_PER_HOUR, MS_PER_MINUTE,
    };
    use shared_types::ports::RoutingQueueRepository;

    use crate::harness::{lead, north, origin, provider, Marketplace, T0};

    async fn routed_market(providers: &[(u64, f64)], balance: rust_decimal::Decimal) -> Marketplace {
        let market = Marketplace::new();
        for &(id, km) in providers {
            market
                .add_provider(provider(id, north(km), 20.0), balance)
                .await;
        }
        market
    }

    // =========================================================================
    // SCHEDULER
    // =========================================================================

    #[tokio::test]
    async fn test_minute_ticks_remind_once_and_expire_once() {
        let market = routed_market(&[(1, 1.0), (2, 2.0)], dec!(100)).await;
        let mut sub = market
            .container
            .event_bus
            .subscribe(EventFilter::topics(vec![EventTopic::Offers]));
        let outcome = market.submit_and_route(lead(1)).await;
        assert_eq!(outcome.matches_created(), 2);

        let mut reminders = 0;
        let mut expired = 0;
        let last_minute = 72 * 60 + 5;
        for minute in 0..=last_minute {
            market.set_time(T0 + minute * MS_PER_MINUTE);
            let report = market.sweep().await;
            assert!(report.errors.is_empty());
            reminders += report.reminders_sent;
            expired += report.offers_expired;

            if minute == 71 * 60 + 59 {
                assert_eq!(reminders, 2, "one reminder per offer by T+71h59m");
                assert_eq!(expired, 0);
            }
            if minute == 72 * 60 + 1 {
                assert_eq!(expired, 2, "every offer expired by T+72h01m");
            }
        }
        assert_eq!(reminders, 2);
        assert_eq!(expired, 2);

        let mut per_offer: HashMap<MatchId, (u32, u32)> = HashMap::new();
        for event in sub.drain() {
            match event {
                MarketplaceEvent::OfferReminderDue(offer) => {
                    per_offer.entry(offer.match_id).or_default().0 += 1
                }
                MarketplaceEvent::OfferExpired(offer) => {
                    per_offer.entry(offer.match_id).or_default().1 += 1
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(per_offer.len(), 2);
        assert!(per_offer.values().all(|&counts| counts == (1, 1)));

        let id = outcome.report().unwrap().lead_id;
        assert!(market
            .offers(id)
            .await
            .iter()
            .all(|m| m.status == MatchStatus::Expired));
        // Without a follow-up policy the lead stays where routing left it
        assert_eq!(market.lead(id).await.status, LeadStatus::Routed);
    }

    #[tokio::test]
    async fn test_expired_offer_cannot_be_accepted() {
        let market = routed_market(&[(1, 1.0)], dec!(100)).await;
        let outcome = market.submit_and_route(lead(1)).await;
        let offer = market.offers(outcome.report().unwrap().lead_id).await[0].clone();

        market.set_time(offer.expires_at);
        let err = market
            .container
            .desk
            .accept(offer.id, offer.provider_id)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::OfferExpired(_)));

        let stored = market.container.desk.offer(offer.id).await.unwrap();
        assert_eq!(stored.status, MatchStatus::Expired);
        assert_eq!(market.balance(ProviderId(1)).await, dec!(100));
        assert_eq!(market.sweep().await.offers_expired, 0);
    }

    // =========================================================================
    // ACCEPTANCE AND REFUNDS
    // =========================================================================

    #[tokio::test]
    async fn test_accept_charges_and_refund_restores_the_wallet() {
        let market = routed_market(&[(1, 1.0), (2, 2.0)], dec!(100)).await;
        let outcome = market.submit_and_route(lead(1)).await;
        let lead_id = outcome.report().unwrap().lead_id;
        let offer = market
            .offers(lead_id)
            .await
            .into_iter()
            .find(|m| m.provider_id == ProviderId(1))
            .unwrap();
        let desk = &market.container.desk;

        desk.view(offer.id, ProviderId(1)).await.unwrap();
        let receipt = desk.accept(offer.id, ProviderId(1)).await.unwrap();
        assert_eq!(receipt.charged, dec!(25.00));
        assert!(!receipt.sold_out);
        assert_eq!(market.balance(ProviderId(1)).await, dec!(75.00));
        assert_eq!(market.lead(lead_id).await.sold_count, 1);

        let accepted = desk.offer(offer.id).await.unwrap();
        assert_eq!(accepted.status, MatchStatus::Accepted);
        assert_eq!(accepted.charge_reference, Some(receipt.ledger_sequence));

        let refunded = desk.refund(offer.id, "consumer unreachable").await.unwrap();
        assert_eq!(refunded.status, MatchStatus::Refunded);
        assert_eq!(market.balance(ProviderId(1)).await, dec!(100.00));
        assert_eq!(market.lead(lead_id).await.sold_count, 0);

        let again = desk.refund(offer.id, "twice").await.unwrap_err();
        assert!(matches!(again, LifecycleError::InvalidTransition { .. }));
        assert_eq!(market.balance(ProviderId(1)).await, dec!(100.00));

        let wallet = market.container.wallet.wallet(ProviderId(1)).await.unwrap();
        assert_eq!(wallet.lifetime_spent, dec!(25.00));
        assert_eq!(wallet.lifetime_refunded, dec!(25.00));
        market
            .container
            .wallet
            .verify_chain(ProviderId(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_lead_without_offer_cap_sells_up_to_tenant_default() {
        let market = routed_market(&[(1, 1.0), (2, 2.0), (3, 3.0)], dec!(100)).await;
        let outcome = market.submit_and_route(lead(1).with_max_sold_count(0)).await;
        assert_eq!(outcome.matches_created(), 3);
        let lead_id = outcome.report().unwrap().lead_id;
        assert_eq!(market.lead(lead_id).await.max_sold_count, 3);

        let desk = &market.container.desk;
        let offers = market.offers(lead_id).await;
        for (i, offer) in offers.iter().enumerate() {
            let receipt = desk.accept(offer.id, offer.provider_id).await.unwrap();
            assert_eq!(receipt.sold_out, i == offers.len() - 1);
        }
        assert_eq!(market.lead(lead_id).await.sold_count, 3);
    }

    #[tokio::test]
    async fn test_short_balance_keeps_offer_open() {
        // Positive balance passes the routing gate but cannot pay 25.00
        let market = routed_market(&[(1, 1.0)], dec!(10)).await;
        let outcome = market.submit_and_route(lead(1)).await;
        let lead_id = outcome.report().unwrap().lead_id;
        let offer = market.offers(lead_id).await[0].clone();

        let err = market
            .container
            .desk
            .accept(offer.id, offer.provider_id)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InsufficientFunds { .. }));

        let stored = market.container.desk.offer(offer.id).await.unwrap();
        assert_eq!(stored.status, MatchStatus::Offered);
        assert_eq!(market.lead(lead_id).await.sold_count, 0);
        assert_eq!(market.balance(ProviderId(1)).await, dec!(10));

        // Topping up lets the same offer go through
        market
            .container
            .wallet
            .purchase(ProviderId(1), dec!(50), Some("pay_123"))
            .await
            .unwrap();
        market
            .container
            .desk
            .accept(offer.id, offer.provider_id)
            .await
            .unwrap();
        assert_eq!(market.balance(ProviderId(1)).await, dec!(35.00));
    }

    #[tokio::test]
    async fn test_wallet_history_reconciles_after_mixed_activity() {
        let market = routed_market(&[(1, 0.5)], dec!(100)).await;
        let wallet = &market.container.wallet;
        wallet
            .purchase(ProviderId(1), dec!(40), Some("pay_001"))
            .await
            .unwrap();
        let replay = wallet
            .purchase(ProviderId(1), dec!(40), Some("pay_001"))
            .await
            .unwrap_err();
        assert!(matches!(replay, WalletError::DuplicatePayment(_)));

        let mut accepted = Vec::new();
        for id in 1..=3 {
            let outcome = market.submit_and_route(lead(id)).await;
            let offer = market.offers(outcome.report().unwrap().lead_id).await[0].clone();
            market
                .container
                .desk
                .accept(offer.id, offer.provider_id)
                .await
                .unwrap();
            accepted.push(offer.id);
        }
        market
            .container
            .desk
            .refund(accepted[1], "duplicate consumer")
            .await
            .unwrap();

        let state = wallet.wallet(ProviderId(1)).await.unwrap();
        assert_eq!(state.lifetime_purchased, dec!(140));
        assert_eq!(state.lifetime_spent, dec!(75.00));
        assert_eq!(state.lifetime_refunded, dec!(25.00));
        assert_eq!(
            state.balance,
            state.lifetime_purchased - state.lifetime_spent + state.lifetime_refunded
        );
        assert_eq!(state.balance, dec!(90.00));

        let history = wallet.transactions(ProviderId(1)).await.unwrap();
        let count = |kind| history.iter().filter(|tx| tx.kind == kind).count();
        assert_eq!(count(TransactionKind::Purchase), 2);
        assert_eq!(count(TransactionKind::Charge), 3);
        assert_eq!(count(TransactionKind::Refund), 1);
        for tx in &history {
            assert_eq!(tx.balance_after, tx.balance_before + tx.amount);
        }
        wallet.verify_chain(ProviderId(1)).await.unwrap();
    }

    // =========================================================================
    // REQUEUE POLICY
    // =========================================================================

    #[tokio::test]
    async fn test_declined_lead_is_rerouted_up_to_the_requeue_limit() {
        let mut config = RuntimeConfig::for_testing();
        config.lifecycle.expiry_policy = ExpiryPolicy::RequeueWhenExhausted { max_requeues: 1 };
        let market = Marketplace::with_config(config);
        market.add_provider(provider(1, origin(), 20.0), dec!(100)).await;
        market.add_provider(provider(2, north(1.0), 20.0), dec!(100)).await;
        let desk = &market.container.desk;

        let outcome = market.submit_and_route(lead(1)).await;
        let lead_id = outcome.report().unwrap().lead_id;
        let first_round = market.offers(lead_id).await;
        assert_eq!(first_round.len(), 2);

        desk.decline(first_round[0].id, first_round[0].provider_id, Some("too far"))
            .await
            .unwrap();
        assert_eq!(market.lead(lead_id).await.status, LeadStatus::Routed);
        desk.decline(first_round[1].id, first_round[1].provider_id, None)
            .await
            .unwrap();

        let requeued = market.lead(lead_id).await;
        assert_eq!(requeued.status, LeadStatus::Queued);
        assert_eq!(requeued.requeue_count, 1);
        let pending = market.container.store.pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].lead_id, lead_id);

        market.set_time(T0 + MS_PER_HOUR);
        let second = market.route(lead_id).await;
        assert_eq!(second.matches_created(), 2);
        let active: Vec<_> = market
            .offers(lead_id)
            .await
            .into_iter()
            .filter(|m| m.is_active())
            .collect();
        assert_eq!(active.len(), 2);

        for offer in &active {
            desk.decline(offer.id, offer.provider_id, None).await.unwrap();
        }
        let exhausted = market.lead(lead_id).await;
        assert_eq!(exhausted.status, LeadStatus::Routed);
        assert_eq!(exhausted.requeue_count, 1);
        assert!(market.container.store.pending(10).await.unwrap().is_empty());
    }
}

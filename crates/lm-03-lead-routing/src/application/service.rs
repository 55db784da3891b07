//! # Lead Routing Service
//!
//! One routing pass per call. The lead is claimed under a lease, every
//! outbound lookup runs under a timeout with bounded retries, and offers are
//! written through the store's active-pair uniqueness guard. A pass that
//! loses any race returns a no-op outcome instead of an error.

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared_bus::{EventPublisher, MarketplaceEvent, NoopPublisher, OfferSnapshot};
use shared_types::entities::{
    GeoPoint, LeadId, LeadRequest, LeadResolution, LeadStatus, Match, ProviderId,
    ProviderProfile, RoutingReason, WorkerId, MS_PER_DAY,
};
use shared_types::ports::{ClaimOutcome, OfferInsert};
use shared_types::time::TimeSource;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::adapters::ConfigTenantPolicy;
use crate::config::RoutingConfig;
use crate::domain::{
    assess_static, pricing, rank_candidates, Candidate, Ineligibility, IneligibilityCounts,
    RoutingError, RoutingOutcome, RoutingReport, SkipReason, ValidationError,
};
use crate::ports::{
    DedupeGate, DedupeVerdict, Dependency, DependencyError, Geocoder, LeadRoutingApi,
    ProviderDirectory, RoutingStores, TenantPolicy, WalletGateway,
};

/// Lead Routing Service - implementation of [`LeadRoutingApi`].
pub struct LeadRoutingService {
    config: RoutingConfig,
    stores: RoutingStores,
    directory: Arc<dyn ProviderDirectory>,
    wallet: Arc<dyn WalletGateway>,
    dedupe: Arc<dyn DedupeGate>,
    geocoder: Option<Arc<dyn Geocoder>>,
    tenants: Arc<dyn TenantPolicy>,
    publisher: Arc<dyn EventPublisher>,
    time_source: Arc<dyn TimeSource>,
}

impl LeadRoutingService {
    /// Creates a service with config-backed tenant defaults, no geocoder,
    /// and no event publishing.
    pub fn new(
        config: RoutingConfig,
        stores: RoutingStores,
        directory: Arc<dyn ProviderDirectory>,
        wallet: Arc<dyn WalletGateway>,
        dedupe: Arc<dyn DedupeGate>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        let tenants = Arc::new(ConfigTenantPolicy::new(&config));
        Self {
            config,
            stores,
            directory,
            wallet,
            dedupe,
            geocoder: None,
            tenants,
            publisher: Arc::new(NoopPublisher::default()),
            time_source,
        }
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_tenant_policy(mut self, tenants: Arc<dyn TenantPolicy>) -> Self {
        self.tenants = tenants;
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Runs `op` under the dependency timeout, retrying transient failures.
    async fn call<T, F, Fut>(&self, dependency: Dependency, op: F) -> Result<T, RoutingError>
    where
        F: Fn() -> Fut + Send,
        Fut: Future<Output = Result<T, DependencyError>> + Send,
    {
        let timeout_ms = self.config.dependency_timeout_ms;
        let mut attempt = 0;
        loop {
            let err = match tokio::time::timeout(Duration::from_millis(timeout_ms), op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => DependencyError::Timeout(timeout_ms),
            };

            if !err.is_transient() {
                return Err(RoutingError::Internal(format!("{dependency} {err}")));
            }
            if attempt >= self.config.dependency_retries {
                return Err(RoutingError::TransientDependency {
                    dependency,
                    message: err.to_string(),
                });
            }

            let delay = self.config.backoff_ms(attempt);
            debug!(%dependency, attempt, delay_ms = delay, error = %err, "Retrying lookup");
            tokio::time::sleep(Duration::from_millis(delay)).await;
            attempt += 1;
        }
    }

    /// Checks structural preconditions and resolves coordinates.
    async fn validate(&self, lead: &LeadRequest) -> Result<GeoPoint, RoutingError> {
        if lead.service_ids.is_empty() {
            return Err(ValidationError::EmptyServiceSet.into());
        }
        if let (Some(min), Some(max)) = (lead.budget.min, lead.budget.max) {
            if min > max {
                return Err(ValidationError::InvalidBudget { min, max }.into());
            }
        }
        if let Some(point) = lead.location.point.filter(GeoPoint::is_valid) {
            return Ok(point);
        }

        let postal = lead
            .location
            .postal_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty());
        let resolved = match (postal, &self.geocoder) {
            (Some(code), Some(geocoder)) => {
                self.call(Dependency::Geocoder, || geocoder.resolve(lead.tenant_id, code))
                    .await?
            }
            _ => None,
        };
        resolved
            .filter(GeoPoint::is_valid)
            .ok_or_else(|| ValidationError::MissingLocation.into())
    }

    /// Runs the store- and wallet-backed checks for one provider.
    async fn assess_dynamic(
        &self,
        profile: &ProviderProfile,
        already_offered: &HashSet<ProviderId>,
    ) -> Result<Option<Ineligibility>, RoutingError> {
        let provider_id = profile.provider_id;
        let prefs = &profile.preferences;
        if already_offered.contains(&provider_id) {
            return Ok(Some(Ineligibility::AlreadyOffered));
        }

        let now = self.time_source.now();
        if let Some(cap) = prefs.max_leads_per_day {
            let since = now.saturating_sub(MS_PER_DAY);
            if self.stores.matches.offers_since(provider_id, since).await? >= cap {
                return Ok(Some(Ineligibility::DailyCapReached));
            }
        }
        if let Some(cap) = prefs.max_leads_per_week {
            let since = now.saturating_sub(7 * MS_PER_DAY);
            if self.stores.matches.offers_since(provider_id, since).await? >= cap {
                return Ok(Some(Ineligibility::WeeklyCapReached));
            }
        }

        if prefs.pause_when_balance_zero {
            let balance = self
                .call(Dependency::Wallet, || self.wallet.balance(provider_id))
                .await?;
            match balance {
                None => return Ok(Some(Ineligibility::NoWallet)),
                Some(b) if b <= Decimal::ZERO => return Ok(Some(Ineligibility::InsufficientFunds)),
                Some(_) => {}
            }
        }
        Ok(None)
    }

    /// Everything after the claim. `reserved` tracks the dedupe reservation
    /// so the caller can drop it when the pass fails.
    async fn run_pass(
        &self,
        lead: &LeadRequest,
        worker: &WorkerId,
        reserved: &mut bool,
    ) -> Result<RoutingOutcome, RoutingError> {
        let point = match self.validate(lead).await {
            Ok(point) => point,
            Err(RoutingError::Validation(v)) => {
                info!(lead_id = %lead.id, reason = %v, "Lead failed validation");
                let report = RoutingReport::partial(lead.id, lead.tenant_id, v.reason());
                return self.complete(lead, worker, report, Vec::new()).await;
            }
            Err(e) => return Err(e),
        };

        match self.call(Dependency::Dedupe, || self.dedupe.check(lead)).await? {
            DedupeVerdict::Duplicate { existing_lead } => {
                info!(lead_id = %lead.id, existing_lead = %existing_lead, "Duplicate lead skipped");
                let report =
                    RoutingReport::partial(lead.id, lead.tenant_id, RoutingReason::Duplicate);
                return self.complete(lead, worker, report, Vec::new()).await;
            }
            DedupeVerdict::Allowed => *reserved = true,
        }

        let profiles = self
            .call(Dependency::Directory, || {
                self.directory
                    .find_candidates(lead.tenant_id, &lead.service_ids)
            })
            .await?;
        let rules = self
            .call(Dependency::Directory, || {
                self.directory.pricing_rules(lead.tenant_id)
            })
            .await?;

        let existing = self.stores.matches.matches_for_lead(lead.id).await?;
        let already_offered: HashSet<ProviderId> = existing
            .iter()
            .filter(|m| m.is_active())
            .map(|m| m.provider_id)
            .collect();

        let mut exclusions = IneligibilityCounts::default();
        let mut eligible: Vec<Candidate> = Vec::new();
        let mut seen = HashSet::new();
        for profile in profiles.iter().filter(|p| p.tenant_id == lead.tenant_id) {
            if !seen.insert(profile.provider_id) {
                continue;
            }
            let candidate = match assess_static(profile, lead, point) {
                Ok(candidate) => candidate,
                Err(reason) => {
                    exclusions.record(reason);
                    continue;
                }
            };
            match self.assess_dynamic(profile, &already_offered).await? {
                Some(reason) => {
                    debug!(lead_id = %lead.id, provider_id = %profile.provider_id, %reason, "Provider excluded");
                    exclusions.record(reason);
                }
                None => eligible.push(candidate),
            }
        }

        let defaults = self.tenants.defaults(lead.tenant_id);
        let max_sold = self
            .stores
            .leads
            .resolve_max_sold_count(lead.id, defaults.max_sold_count)
            .await?;
        let occupied = already_offered.len() as u32 + lead.sold_count;
        let capacity = max_sold.saturating_sub(occupied) as usize;

        let eligible_count = eligible.len() as u32;
        let selected: Vec<Candidate> = rank_candidates(eligible).into_iter().take(capacity).collect();
        let quote = pricing::quote(&rules, lead, defaults.fallback_price);

        // Lookups above may have outlived the lease; offers are only written
        // under a lease this worker still holds
        let now = self.time_source.now();
        if !self
            .stores
            .leads
            .renew_lease(lead.id, worker, now, self.config.lease_ms)
            .await?
        {
            warn!(lead_id = %lead.id, worker = %worker, "Lease lost before creating offers");
            return Ok(RoutingOutcome::Skipped(SkipReason::LeaseLost));
        }

        let mut created = Vec::with_capacity(selected.len());
        for candidate in &selected {
            let offer = Match::offer(
                lead,
                candidate.provider_id,
                candidate.score(),
                candidate.distance_km,
                quote.price,
                now,
                defaults.offer_ttl_ms,
            );
            match self.stores.matches.insert_offer(offer.clone()).await? {
                OfferInsert::Inserted(_) => created.push(offer),
                OfferInsert::DuplicateActive(existing) => {
                    debug!(lead_id = %lead.id, provider_id = %candidate.provider_id, match_id = %existing, "Offer already active");
                }
            }
        }

        let routed = !created.is_empty() || !already_offered.is_empty();
        if routed {
            self.call(Dependency::Dedupe, || self.dedupe.record(lead))
                .await?;
            *reserved = false;
        } else {
            self.release_reservation(lead).await;
            *reserved = false;
        }

        let report = RoutingReport {
            lead_id: lead.id,
            tenant_id: lead.tenant_id,
            status: if routed {
                LeadStatus::Routed
            } else {
                LeadStatus::Partial
            },
            reason: (!routed).then_some(RoutingReason::NoEligibleProviders),
            matches_created: created.len() as u32,
            candidates_considered: seen.len() as u32,
            eligible: eligible_count,
            exclusions,
            price: Some(quote.price),
            offers: created.iter().map(|m| m.id).collect(),
        };
        self.complete(lead, worker, report, created).await
    }

    /// Writes the final status, closes the queue entry, and publishes.
    async fn complete(
        &self,
        lead: &LeadRequest,
        worker: &WorkerId,
        report: RoutingReport,
        created: Vec<Match>,
    ) -> Result<RoutingOutcome, RoutingError> {
        let resolution = match (report.status, report.reason) {
            (LeadStatus::Routed, _) => LeadResolution::routed(),
            (_, Some(reason)) => LeadResolution::partial(reason),
            (_, None) => LeadResolution::partial(RoutingReason::NoEligibleProviders),
        };

        let now = self.time_source.now();
        if !self
            .stores
            .leads
            .finish_lead(lead.id, worker, resolution, now)
            .await?
        {
            warn!(lead_id = %lead.id, worker = %worker, "Lease lost before finishing");
            // The offers are stored; the next owner treats them as already offered
            self.announce_offers(&created).await;
            return Ok(RoutingOutcome::Skipped(SkipReason::LeaseLost));
        }
        if let Err(e) = self.stores.queue.mark_completed(lead.id, now).await {
            warn!(lead_id = %lead.id, error = %e, "Failed to complete queue entry");
        }

        self.announce_offers(&created).await;
        self.publisher
            .publish(MarketplaceEvent::LeadRouted {
                tenant_id: lead.tenant_id,
                lead_id: lead.id,
                status: report.status,
                reason: report.reason,
                matches_created: report.matches_created,
            })
            .await;

        info!(
            lead_id = %lead.id,
            tenant_id = %lead.tenant_id,
            status = report.status.as_str(),
            reason = report.reason.map(RoutingReason::as_str),
            matches_created = report.matches_created,
            eligible = report.eligible,
            excluded = report.exclusions.total(),
            "Lead routed"
        );
        Ok(RoutingOutcome::Completed(report))
    }

    async fn announce_offers(&self, created: &[Match]) {
        for offer in created {
            self.publisher
                .publish(MarketplaceEvent::OfferCreated(OfferSnapshot::from(offer)))
                .await;
        }
    }

    async fn release_reservation(&self, lead: &LeadRequest) {
        if let Err(e) = self.call(Dependency::Dedupe, || self.dedupe.release(lead)).await {
            warn!(lead_id = %lead.id, error = %e, "Failed to release dedupe reservation");
        }
    }

    /// Sends the lead back to the queue, or dead-letters it once attempts
    /// are exhausted.
    async fn retry_or_dead_letter(
        &self,
        lead: &LeadRequest,
        worker: &WorkerId,
        err: RoutingError,
    ) -> Result<RoutingOutcome, RoutingError> {
        let attempts = lead.attempts;
        if attempts >= self.config.max_attempts {
            let now = self.time_source.now();
            if !self
                .stores
                .leads
                .finish_lead(lead.id, worker, LeadResolution::dead(), now)
                .await?
            {
                return Ok(RoutingOutcome::Skipped(SkipReason::LeaseLost));
            }
            if let Err(e) = self.stores.queue.mark_dead(lead.id, now).await {
                warn!(lead_id = %lead.id, error = %e, "Failed to dead-letter queue entry");
            }
            error!(lead_id = %lead.id, attempts, error = %err, "Lead dead-lettered");
            self.publisher
                .publish(MarketplaceEvent::LeadDeadLettered {
                    tenant_id: lead.tenant_id,
                    lead_id: lead.id,
                    attempts,
                })
                .await;
            return Ok(RoutingOutcome::DeadLettered { attempts });
        }

        self.stores.leads.release_lead(lead.id, worker).await?;
        if let Err(e) = self.stores.queue.mark_pending(lead.id).await {
            warn!(lead_id = %lead.id, error = %e, "Failed to reopen queue entry");
        }
        warn!(
            lead_id = %lead.id,
            attempts,
            max_attempts = self.config.max_attempts,
            error = %err,
            "Routing failed, lead requeued"
        );
        Ok(RoutingOutcome::Retrying {
            attempts,
            error: err.kind(),
            message: err.to_string(),
        })
    }
}

#[async_trait]
impl LeadRoutingApi for LeadRoutingService {
    async fn route(
        &self,
        lead_id: LeadId,
        worker: &WorkerId,
    ) -> Result<RoutingOutcome, RoutingError> {
        let now = self.time_source.now();
        let lead = match self
            .stores
            .leads
            .claim_lead(lead_id, worker, now, self.config.lease_ms)
            .await?
        {
            ClaimOutcome::Claimed(lead) => lead,
            ClaimOutcome::Busy => {
                debug!(lead_id = %lead_id, worker = %worker, "Claim lost");
                return Ok(RoutingOutcome::Skipped(SkipReason::Busy));
            }
            ClaimOutcome::NotClaimable(status) => {
                debug!(lead_id = %lead_id, status = status.as_str(), "Lead not claimable");
                return Ok(RoutingOutcome::Skipped(SkipReason::NotClaimable(status)));
            }
            ClaimOutcome::NotFound => {
                warn!(lead_id = %lead_id, "Lead not found");
                return Ok(RoutingOutcome::Skipped(SkipReason::NotFound));
            }
        };
        debug!(lead_id = %lead_id, worker = %worker, attempts = lead.attempts, "Lead claimed");

        if let Err(e) = self.stores.queue.mark_processing(lead_id).await {
            debug!(lead_id = %lead_id, error = %e, "No queue entry to mark");
        }

        let mut reserved = false;
        match self.run_pass(&lead, worker, &mut reserved).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                if reserved {
                    self.release_reservation(&lead).await;
                }
                if err.is_transient() {
                    return self.retry_or_dead_letter(&lead, worker, err).await;
                }
                error!(lead_id = %lead_id, kind = %err.kind(), error = %err, "Routing aborted");
                if let Err(e) = self.stores.leads.release_lead(lead_id, worker).await {
                    warn!(lead_id = %lead_id, error = %e, "Failed to release lead");
                }
                Err(err)
            }
        }
    }

    async fn reclaimable_leads(&self) -> Result<Vec<LeadId>, RoutingError> {
        let now = self.time_source.now();
        Ok(self.stores.leads.stale_leases(now).await?)
    }

    async fn pending_leads(&self, limit: usize) -> Result<Vec<LeadId>, RoutingError> {
        Ok(self
            .stores
            .queue
            .pending(limit)
            .await?
            .into_iter()
            .map(|entry| entry.lead_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{MockDedupe, MockDirectory, MockGeocoder, MockWallet};
    use marketplace_store::InMemoryMarketplaceStore;
    use rust_decimal_macros::dec;
    use shared_bus::{EventFilter, InMemoryEventBus};
    use shared_types::entities::{
        BudgetRange, ConsumerContact, LeadLocation, MatchStatus, PricingRule, ProviderPreferences,
        ServiceId, TenantId, MS_PER_HOUR,
    };
    use shared_types::errors::ErrorKind;
    use shared_types::entities::Money;
    use shared_types::ports::{
        LeadRepository, MatchRepository, RoutingQueueRepository, SaleOutcome,
    };
    use shared_types::time::ManualTimeSource;
    use std::sync::atomic::{AtomicBool, Ordering};

    const T0: u64 = 1_700_000_000_000;

    fn here() -> GeoPoint {
        GeoPoint::new(41.8781, -87.6298)
    }

    fn lead(id: u64) -> LeadRequest {
        let email = format!("dee{id}@example.com");
        LeadRequest::new(
            LeadId(id),
            TenantId(1),
            ConsumerContact::new(Some("Dee"), Some(email.as_str()), None),
            LeadLocation::at(here()),
            [ServiceId(1)],
            T0,
        )
    }

    fn provider(id: u64, offset_deg: f64) -> ProviderProfile {
        ProviderProfile::new(ProviderId(id), TenantId(1))
            .with_rating(4.0)
            .offering(ServiceId(1))
            .area(GeoPoint::new(here().lat + offset_deg, here().lng), 50.0)
    }

    struct Harness {
        store: Arc<InMemoryMarketplaceStore>,
        directory: Arc<MockDirectory>,
        wallet: Arc<MockWallet>,
        dedupe: Arc<MockDedupe>,
        clock: Arc<ManualTimeSource>,
        bus: Arc<InMemoryEventBus>,
        service: LeadRoutingService,
    }

    fn harness(profiles: Vec<ProviderProfile>) -> Harness {
        let balances: Vec<_> = profiles.iter().map(|p| (p.provider_id, dec!(100))).collect();
        let store = Arc::new(InMemoryMarketplaceStore::new());
        let directory = Arc::new(MockDirectory::with_profiles(profiles));
        let wallet = Arc::new(MockWallet::with_balances(balances));
        let dedupe = Arc::new(MockDedupe::default());
        let clock = Arc::new(ManualTimeSource::new(T0));
        let bus = Arc::new(InMemoryEventBus::new());
        let service = LeadRoutingService::new(
            RoutingConfig::for_testing(),
            RoutingStores::from_store(store.clone()),
            directory.clone(),
            wallet.clone(),
            dedupe.clone(),
            clock.clone(),
        )
        .with_publisher(bus.clone());
        Harness {
            store,
            directory,
            wallet,
            dedupe,
            clock,
            bus,
            service,
        }
    }

    fn worker() -> WorkerId {
        WorkerId::new("router-0")
    }

    async fn submit(h: &Harness, lead: LeadRequest) -> LeadId {
        let id = lead.id;
        h.store.insert_lead(lead).await.unwrap();
        h.store.enqueue(TenantId(1), id, T0).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_routes_top_ranked_up_to_capacity() {
        let h = harness(vec![
            provider(1, 0.10),
            provider(2, 0.0),
            provider(3, 0.05),
            provider(4, 0.20),
        ]);
        let mut sub = h.bus.subscribe(EventFilter::all());
        let id = submit(&h, lead(1)).await;

        let outcome = h.service.route(id, &worker()).await.unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.status, LeadStatus::Routed);
        assert_eq!(report.matches_created, 3);
        assert_eq!(report.eligible, 4);

        let matches = h.store.matches_for_lead(id).await.unwrap();
        let mut providers: Vec<u64> = matches.iter().map(|m| m.provider_id.0).collect();
        providers.sort_unstable();
        assert_eq!(providers, vec![1, 2, 3]);
        for m in &matches {
            assert_eq!(m.status, MatchStatus::Offered);
            assert_eq!(m.expires_at, T0 + 72 * MS_PER_HOUR);
            assert_eq!(m.price, dec!(25.00));
        }

        let stored = h.store.get_lead(id).await.unwrap().unwrap();
        assert_eq!(stored.status, LeadStatus::Routed);
        assert_eq!(stored.routed_at, Some(T0));
        assert!(h.dedupe.is_confirmed(&stored));

        let events = sub.drain();
        assert_eq!(events.len(), 4);
        assert!(matches!(
            events.last(),
            Some(MarketplaceEvent::LeadRouted { matches_created: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_service_set_is_partial_without_lookups() {
        let h = harness(vec![provider(1, 0.0)]);
        let mut empty = lead(1);
        empty.service_ids.clear();
        let id = submit(&h, empty).await;

        let outcome = h.service.route(id, &worker()).await.unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.status, LeadStatus::Partial);
        assert_eq!(report.reason, Some(RoutingReason::NoServices));
        assert_eq!(outcome.matches_created(), 0);
        assert_eq!(h.directory.calls.load(Ordering::SeqCst), 0);
        assert!(h.store.matches_for_lead(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_budget_is_partial() {
        let h = harness(vec![provider(1, 0.0)]);
        let id = submit(
            &h,
            lead(1).with_budget(BudgetRange::new(Some(dec!(900)), Some(dec!(100)))),
        )
        .await;

        let outcome = h.service.route(id, &worker()).await.unwrap();
        assert_eq!(
            outcome.report().unwrap().reason,
            Some(RoutingReason::InvalidBudget)
        );
    }

    #[tokio::test]
    async fn test_postal_code_resolved_through_geocoder() {
        let mut h = harness(vec![provider(1, 0.0)]);
        h.service = h
            .service
            .with_geocoder(Arc::new(MockGeocoder::with_code("60601", here())));

        let mut by_postal = lead(1);
        by_postal.location = LeadLocation::postal("60601");
        let id = submit(&h, by_postal).await;
        let outcome = h.service.route(id, &worker()).await.unwrap();
        assert_eq!(outcome.matches_created(), 1);

        let mut unknown = lead(2);
        unknown.location = LeadLocation::postal("99999");
        let id = submit(&h, unknown).await;
        let outcome = h.service.route(id, &worker()).await.unwrap();
        assert_eq!(
            outcome.report().unwrap().reason,
            Some(RoutingReason::MissingLocation)
        );
    }

    #[tokio::test]
    async fn test_duplicate_submission_yields_zero_matches() {
        let h = harness(vec![provider(1, 0.0)]);
        let first = submit(&h, lead(1)).await;
        let mut twin = lead(2);
        twin.contact = lead(1).contact;
        let second = submit(&h, twin).await;

        assert_eq!(h.service.route(first, &worker()).await.unwrap().matches_created(), 1);
        let outcome = h.service.route(second, &worker()).await.unwrap();
        assert_eq!(outcome.matches_created(), 0);
        assert_eq!(
            outcome.report().unwrap().reason,
            Some(RoutingReason::Duplicate)
        );
    }

    #[tokio::test]
    async fn test_exclusions_are_counted_and_do_not_fail_the_pass() {
        let mut capped = provider(3, 0.0);
        capped.preferences = ProviderPreferences {
            max_leads_per_day: Some(0),
            ..Default::default()
        };
        let far = provider(4, 5.0);
        let h = harness(vec![provider(1, 0.0), provider(2, 0.0), capped, far]);
        h.wallet.balances.lock().insert(ProviderId(2), Decimal::ZERO);
        h.wallet.balances.lock().remove(&ProviderId(1));

        let id = submit(&h, lead(1)).await;
        let outcome = h.service.route(id, &worker()).await.unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.status, LeadStatus::Partial);
        assert_eq!(report.reason, Some(RoutingReason::NoEligibleProviders));
        assert_eq!(report.exclusions.get(Ineligibility::NoWallet), 1);
        assert_eq!(report.exclusions.get(Ineligibility::InsufficientFunds), 1);
        assert_eq!(report.exclusions.get(Ineligibility::DailyCapReached), 1);
        assert_eq!(report.exclusions.get(Ineligibility::OutOfArea), 1);
        // A partial pass never holds the dedupe slot
        assert_eq!(h.dedupe.len(), 0);
    }

    #[tokio::test]
    async fn test_solvency_gate_can_be_opted_out() {
        let mut lenient = provider(1, 0.0);
        lenient.preferences.pause_when_balance_zero = false;
        let h = harness(vec![lenient]);
        h.wallet.balances.lock().clear();

        let id = submit(&h, lead(1)).await;
        assert_eq!(h.service.route(id, &worker()).await.unwrap().matches_created(), 1);
    }

    #[tokio::test]
    async fn test_pricing_rule_applied_to_offers() {
        let h = harness(vec![provider(1, 0.0)]);
        h.directory
            .rules
            .lock()
            .push(PricingRule::for_service(1, TenantId(1), ServiceId(1), dec!(40)));

        let id = submit(&h, lead(1).exclusive().with_max_sold_count(1)).await;
        let outcome = h.service.route(id, &worker()).await.unwrap();
        assert_eq!(outcome.report().unwrap().price, Some(dec!(120.00)));
    }

    #[tokio::test]
    async fn test_second_route_is_noop() {
        let h = harness(vec![provider(1, 0.0)]);
        let id = submit(&h, lead(1)).await;

        assert!(!h.service.route(id, &worker()).await.unwrap().is_noop());
        let again = h.service.route(id, &WorkerId::new("router-1")).await.unwrap();
        assert_eq!(
            again,
            RoutingOutcome::Skipped(SkipReason::NotClaimable(LeadStatus::Routed))
        );
        assert_eq!(h.store.matches_for_lead(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_requeues_then_dead_letters() {
        let h = harness(vec![provider(1, 0.0)]);
        h.directory.fail_next(u32::MAX);
        let id = submit(&h, lead(1)).await;

        for attempt in 1..=2 {
            let outcome = h.service.route(id, &worker()).await.unwrap();
            assert_eq!(
                outcome,
                RoutingOutcome::Retrying {
                    attempts: attempt,
                    error: ErrorKind::TransientDependency,
                    message: "directory unavailable: unavailable: directory offline".into(),
                }
            );
            let stored = h.store.get_lead(id).await.unwrap().unwrap();
            assert_eq!(stored.status, LeadStatus::Queued);
            // The dedupe reservation is dropped so the retry can take it again
            assert_eq!(h.dedupe.len(), 0);
        }

        let outcome = h.service.route(id, &worker()).await.unwrap();
        assert_eq!(outcome, RoutingOutcome::DeadLettered { attempts: 3 });
        let stored = h.store.get_lead(id).await.unwrap().unwrap();
        assert_eq!(stored.status, LeadStatus::Dead);
        assert!(h.store.pending(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_recovers_within_retry_budget() {
        let h = harness(vec![provider(1, 0.0)]);
        // One failure is absorbed by the in-call retry
        h.directory.fail_next(1);
        let id = submit(&h, lead(1)).await;
        assert_eq!(h.service.route(id, &worker()).await.unwrap().matches_created(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_wallet_times_out_as_transient() {
        let h = harness(vec![provider(1, 0.0)]);
        h.wallet.delay_ms.store(10_000, Ordering::SeqCst);
        let id = submit(&h, lead(1)).await;

        let outcome = h.service.route(id, &worker()).await.unwrap();
        match outcome {
            RoutingOutcome::Retrying { error, message, .. } => {
                assert_eq!(error, ErrorKind::TransientDependency);
                assert_eq!(message, "wallet unavailable: timed out after 100ms");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_expired_lease_can_be_reclaimed() {
        let h = harness(vec![provider(1, 0.0)]);
        let id = submit(&h, lead(1)).await;
        let crashed = WorkerId::new("crashed");
        h.store.claim_lead(id, &crashed, T0, 1_000).await.unwrap();

        assert_eq!(
            h.service.route(id, &worker()).await.unwrap(),
            RoutingOutcome::Skipped(SkipReason::Busy)
        );

        h.clock.advance(1_000);
        assert_eq!(h.service.reclaimable_leads().await.unwrap(), vec![id]);
        assert_eq!(h.service.route(id, &worker()).await.unwrap().matches_created(), 1);
    }

    #[tokio::test]
    async fn test_unset_offer_cap_is_stored_as_tenant_default() {
        let h = harness(vec![
            provider(1, 0.0),
            provider(2, 0.05),
            provider(3, 0.10),
            provider(4, 0.15),
        ]);
        let id = submit(&h, lead(1).with_max_sold_count(0)).await;

        let outcome = h.service.route(id, &worker()).await.unwrap();
        assert_eq!(outcome.matches_created(), 3);

        let stored = h.store.get_lead(id).await.unwrap().unwrap();
        assert_eq!(stored.max_sold_count, 3);
        assert_eq!(
            h.store.record_sale(id).await.unwrap(),
            SaleOutcome::Sold {
                sold_count: 1,
                max_sold_count: 3
            }
        );
    }

    /// Pushes the clock past the lease on its first lookup and, when
    /// `rival` is set, lets that worker take the lead over.
    struct StallingWallet {
        store: Arc<InMemoryMarketplaceStore>,
        clock: Arc<ManualTimeSource>,
        lead_id: LeadId,
        rival: Option<WorkerId>,
        stalled: AtomicBool,
    }

    #[async_trait]
    impl WalletGateway for StallingWallet {
        async fn balance(
            &self,
            _provider_id: ProviderId,
        ) -> Result<Option<Money>, DependencyError> {
            if !self.stalled.swap(true, Ordering::SeqCst) {
                let lease_ms = RoutingConfig::for_testing().lease_ms;
                self.clock.advance(lease_ms + 1);
                if let Some(rival) = &self.rival {
                    let claim = self
                        .store
                        .claim_lead(self.lead_id, rival, self.clock.now(), lease_ms)
                        .await
                        .unwrap();
                    assert!(matches!(claim, ClaimOutcome::Claimed(_)));
                }
            }
            Ok(Some(dec!(100)))
        }
    }

    fn stalling_service(h: &Harness, rival: Option<WorkerId>) -> LeadRoutingService {
        let wallet = Arc::new(StallingWallet {
            store: h.store.clone(),
            clock: h.clock.clone(),
            lead_id: LeadId(1),
            rival,
            stalled: AtomicBool::new(false),
        });
        LeadRoutingService::new(
            RoutingConfig::for_testing(),
            RoutingStores::from_store(h.store.clone()),
            h.directory.clone(),
            wallet,
            h.dedupe.clone(),
            h.clock.clone(),
        )
        .with_publisher(h.bus.clone())
    }

    #[tokio::test]
    async fn test_slow_pass_renews_a_lease_nobody_took() {
        let h = harness(vec![provider(1, 0.0), provider(2, 0.05)]);
        let service = stalling_service(&h, None);
        let id = submit(&h, lead(1)).await;

        let outcome = service.route(id, &worker()).await.unwrap();
        assert_eq!(outcome.matches_created(), 2);
        assert_eq!(
            h.store.get_lead(id).await.unwrap().unwrap().status,
            LeadStatus::Routed
        );
    }

    #[tokio::test]
    async fn test_lease_lost_mid_pass_creates_no_offers() {
        let h = harness(vec![provider(1, 0.0), provider(2, 0.05)]);
        let rival = WorkerId::new("router-1");
        let service = stalling_service(&h, Some(rival));
        let mut sub = h.bus.subscribe(EventFilter::all());
        let id = submit(&h, lead(1)).await;

        assert_eq!(
            service.route(id, &worker()).await.unwrap(),
            RoutingOutcome::Skipped(SkipReason::LeaseLost)
        );
        assert!(h.store.matches_for_lead(id).await.unwrap().is_empty());
        assert!(sub.drain().is_empty());

        // The rival stalls too; once its lease lapses the lead routes normally
        // and every stored offer is announced
        h.clock.advance(RoutingConfig::for_testing().lease_ms);
        let outcome = h.service.route(id, &worker()).await.unwrap();
        assert_eq!(outcome.matches_created(), 2);
        let announced = sub
            .drain()
            .into_iter()
            .filter(|e| matches!(e, MarketplaceEvent::OfferCreated(_)))
            .count();
        assert_eq!(announced, 2);
        assert_eq!(h.store.matches_for_lead(id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_pending_leads_lists_queue() {
        let h = harness(vec![]);
        submit(&h, lead(1)).await;
        submit(&h, lead(2)).await;
        assert_eq!(
            h.service.pending_leads(10).await.unwrap(),
            vec![LeadId(1), LeadId(2)]
        );
    }
}

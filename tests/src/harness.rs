//! # Test Harness
//!
//! A fully wired [`MarketplaceContainer`] on a [`ManualTimeSource`], plus
//! fixtures for leads and providers around a fixed origin.

use std::sync::Arc;

use lm_01_wallet_ledger::WalletApi;
use lm_03_lead_routing::{LeadRoutingApi, RoutingOutcome};
use lm_04_offer_lifecycle::{OfferSchedulerApi, SweepReport};
use marketplace_runtime::{MarketplaceContainer, RuntimeConfig};
use marketplace_store::InMemoryProviderCatalog;
use rust_decimal::Decimal;
use shared_types::entities::{
    ConsumerContact, GeoPoint, LeadId, LeadLocation, LeadRequest, Match, ProviderId,
    ProviderProfile, ServiceId, TenantId, Timestamp, WorkerId,
};
use shared_types::ports::{LeadRepository, MatchRepository, RoutingQueueRepository};
use shared_types::time::{ManualTimeSource, TimeSource};

/// 2023-11-14T22:13:20Z
pub const T0: Timestamp = 1_700_000_000_000;
pub const TENANT: TenantId = TenantId(1);
pub const SERVICE: ServiceId = ServiceId(1);

const KM_PER_DEGREE_LAT: f64 = 111.195;

pub fn origin() -> GeoPoint {
    GeoPoint::new(30.2672, -97.7431)
}

/// A point `km` due north of the origin.
pub fn north(km: f64) -> GeoPoint {
    GeoPoint::new(origin().lat + km / KM_PER_DEGREE_LAT, origin().lng)
}

/// A lead at the origin asking for [`SERVICE`], created at [`T0`].
pub fn lead(id: u64) -> LeadRequest {
    let email = format!("consumer{id}@example.com");
    LeadRequest::new(
        LeadId(id),
        TENANT,
        ConsumerContact::new(Some("Robin"), Some(email.as_str()), None),
        LeadLocation::at(origin()),
        [SERVICE],
        T0,
    )
}

/// A provider offering [`SERVICE`] with one area.
pub fn provider(id: u64, center: GeoPoint, radius_km: f64) -> ProviderProfile {
    ProviderProfile::new(ProviderId(id), TENANT)
        .with_rating(4.5)
        .offering(SERVICE)
        .area(center, radius_km)
}

pub struct Marketplace {
    pub container: Arc<MarketplaceContainer>,
    pub clock: Arc<ManualTimeSource>,
}

impl Marketplace {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::for_testing())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let clock = Arc::new(ManualTimeSource::new(T0));
        let container = MarketplaceContainer::assemble(
            config,
            Arc::new(InMemoryProviderCatalog::new()),
            clock.clone(),
        );
        Self {
            container: Arc::new(container),
            clock,
        }
    }

    pub fn catalog(&self) -> &InMemoryProviderCatalog {
        &self.container.catalog
    }

    /// Registers the profile and funds its wallet with `balance`.
    pub async fn add_provider(&self, profile: ProviderProfile, balance: Decimal) -> ProviderId {
        let id = profile.provider_id;
        self.catalog().upsert_provider(profile);
        if balance > Decimal::ZERO {
            self.container
                .wallet
                .purchase(id, balance, None)
                .await
                .unwrap();
        } else {
            self.container.wallet.open_wallet(id).await.unwrap();
        }
        id
    }

    /// Stores the lead and opens its queue entry at the current time.
    pub async fn submit(&self, lead: LeadRequest) -> LeadId {
        let id = lead.id;
        let tenant = lead.tenant_id;
        self.container.store.insert_lead(lead).await.unwrap();
        self.container
            .store
            .enqueue(tenant, id, self.clock.now())
            .await
            .unwrap();
        id
    }

    pub async fn route(&self, id: LeadId) -> RoutingOutcome {
        self.container
            .routing
            .route(id, &WorkerId::new("it-router"))
            .await
            .unwrap()
    }

    pub async fn submit_and_route(&self, lead: LeadRequest) -> RoutingOutcome {
        let id = self.submit(lead).await;
        self.route(id).await
    }

    pub async fn lead(&self, id: LeadId) -> LeadRequest {
        self.container.store.get_lead(id).await.unwrap().unwrap()
    }

    pub async fn offers(&self, id: LeadId) -> Vec<Match> {
        self.container.store.matches_for_lead(id).await.unwrap()
    }

    pub async fn balance(&self, provider: ProviderId) -> Decimal {
        self.container.wallet.get_balance(provider).await.unwrap()
    }

    pub async fn sweep(&self) -> SweepReport {
        self.container.scheduler.run_once().await
    }

    pub fn set_time(&self, at: Timestamp) {
        self.clock.set(at);
    }
}

//! # Subsystem Wiring
//!
//! ```text
//! Level 0: store, catalog, event bus, clock
//! Level 1: Wallet Ledger (1), Dedupe Guard (2)
//! Level 2: Lead Routing (3)      ← directory, wallet gate, dedupe gate, geocoder
//! Level 3: Offer Lifecycle (4)   ← ledger gateway, dedupe log cleaner
//! ```
//!
//! Every subsystem publishes to the same [`InMemoryEventBus`]. The worker
//! pool and the periodic triggers need a tokio runtime and are started by
//! [`crate::MarketplaceRuntime`], not here.

use std::sync::Arc;

use lm_01_wallet_ledger::WalletLedgerService;
use lm_02_dedupe_guard::DedupeGuardService;
use lm_03_lead_routing::{LeadRoutingService, RoutingStores};
use lm_04_offer_lifecycle::{LifecycleStores, OfferDesk, OfferScheduler};
use marketplace_store::{CatalogError, InMemoryMarketplaceStore, InMemoryProviderCatalog};
use shared_bus::InMemoryEventBus;
use shared_types::time::{SystemTimeSource, TimeSource};
use tracing::{info, instrument};

use crate::adapters::{CatalogDirectory, DedupeGuardAdapter, WalletLedgerAdapter};
use crate::container::config::RuntimeConfig;

/// Central container holding all subsystem instances.
pub struct MarketplaceContainer {
    // =========================================================================
    // LEVEL 0: Shared infrastructure
    // =========================================================================
    pub store: Arc<InMemoryMarketplaceStore>,
    pub catalog: Arc<InMemoryProviderCatalog>,
    pub event_bus: Arc<InMemoryEventBus>,
    pub time_source: Arc<dyn TimeSource>,

    // =========================================================================
    // LEVEL 1
    // =========================================================================
    /// Wallet Ledger (Subsystem 1)
    pub wallet: Arc<WalletLedgerService>,
    /// Dedupe Guard (Subsystem 2)
    pub dedupe: Arc<DedupeGuardService>,

    // =========================================================================
    // LEVEL 2-3
    // =========================================================================
    /// Lead Routing (Subsystem 3)
    pub routing: Arc<LeadRoutingService>,
    /// Offer Lifecycle scheduler (Subsystem 4)
    pub scheduler: Arc<OfferScheduler>,
    /// Offer Lifecycle acceptance flow (Subsystem 4)
    pub desk: Arc<OfferDesk>,

    pub config: RuntimeConfig,
}

impl MarketplaceContainer {
    /// Wires the container on the wall clock, loading the catalog from
    /// `config.catalog_path` when set.
    pub fn new(config: RuntimeConfig) -> Result<Self, CatalogError> {
        let catalog = match &config.catalog_path {
            Some(path) => InMemoryProviderCatalog::load(path)?,
            None => InMemoryProviderCatalog::new(),
        };
        Ok(Self::assemble(
            config,
            Arc::new(catalog),
            Arc::new(SystemTimeSource),
        ))
    }

    /// Wires the container around an existing catalog and clock.
    #[instrument(name = "marketplace_init", skip_all)]
    pub fn assemble(
        config: RuntimeConfig,
        catalog: Arc<InMemoryProviderCatalog>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        info!("Phase 1: Creating shared infrastructure");
        let store = Arc::new(InMemoryMarketplaceStore::new());
        let event_bus = Arc::new(InMemoryEventBus::new());

        info!("Phase 2: Initializing wallet ledger and dedupe guard");
        let wallet = Arc::new(WalletLedgerService::new(
            config.wallet.clone(),
            time_source.clone(),
        ));
        let dedupe = Arc::new(DedupeGuardService::new(
            config.dedupe.clone(),
            time_source.clone(),
        ));
        let wallet_adapter = Arc::new(WalletLedgerAdapter::new(wallet.clone()));
        let dedupe_adapter = Arc::new(DedupeGuardAdapter::new(dedupe.clone()));
        let directory = Arc::new(CatalogDirectory::new(catalog.clone()));

        info!("Phase 3: Initializing lead routing");
        let routing = Arc::new(
            LeadRoutingService::new(
                config.routing.clone(),
                RoutingStores::from_store(store.clone()),
                directory.clone(),
                wallet_adapter.clone(),
                dedupe_adapter.clone(),
                time_source.clone(),
            )
            .with_geocoder(directory)
            .with_publisher(event_bus.clone()),
        );

        info!("Phase 4: Initializing offer lifecycle");
        let stores = LifecycleStores::from_store(store.clone());
        let scheduler = Arc::new(
            OfferScheduler::new(config.lifecycle.clone(), stores.clone(), time_source.clone())
                .with_dedupe_log(dedupe_adapter)
                .with_publisher(event_bus.clone()),
        );
        let desk = Arc::new(
            OfferDesk::new(
                config.lifecycle.clone(),
                stores,
                wallet_adapter,
                time_source.clone(),
            )
            .with_publisher(event_bus.clone()),
        );

        let (providers, rules, postal_codes) = catalog.counts();
        info!(
            providers,
            rules,
            postal_codes,
            workers = config.routing.workers,
            "Marketplace container ready"
        );

        Self {
            store,
            catalog,
            event_bus,
            time_source,
            wallet,
            dedupe,
            routing,
            scheduler,
            desk,
            config,
        }
    }
}

//! # LM-03 Lead Routing
//!
//! Converts a pending lead into zero or more ranked, time-boxed offers.
//!
//! **Subsystem ID:** 3  
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Routing Pass
//!
//! ```text
//! claim (lease) ─→ validate ─→ dedupe check ─→ directory lookup
//!                     │              │                 │
//!                  partial        partial      bounding box ─→ haversine
//!                                                      │
//!                   wallet gate ←─ caps ←─ budget ←────┘
//!                        │
//!                  rank ─→ take capacity ─→ insert offers (unique pair)
//!                                                │
//!                                     routed / partial + events
//! ```
//!
//! ## Failure Handling
//!
//! | Error | Effect on the lead |
//! |-------|--------------------|
//! | Validation | `partial` with a reason code |
//! | Transient dependency | released to `queued`, retried with backoff |
//! | Retries exhausted | `dead` |
//! | Provider insufficient funds | provider excluded, routing continues |
//! | Claim or offer race | the losing writer is a no-op |
//!
//! ## Module Structure
//!
//! ```text
//! lm-03-lead-routing/
//! ├── domain/          # Geo, eligibility, ranking, pricing, errors
//! ├── ports/           # LeadRoutingApi (inbound) + directory/wallet/dedupe/geocoder (outbound)
//! ├── application/     # LeadRoutingService, RoutingWorkerPool
//! ├── adapters/        # Config-backed tenant policy
//! └── config.rs        # RoutingConfig
//! ```

#![warn(clippy::all)]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use adapters::ConfigTenantPolicy;
pub use application::{LeadRoutingService, PoolStats, RoutingWorkerPool};
pub use config::RoutingConfig;
pub use domain::{
    haversine_km, rank_candidates, BoundingBox, Candidate, Ineligibility, IneligibilityCounts,
    PriceQuote, RoutingError, RoutingOutcome, RoutingReport, SkipReason, ValidationError,
};
pub use ports::{
    DedupeGate, DedupeVerdict, Dependency, DependencyError, Geocoder, LeadRoutingApi,
    ProviderDirectory, RoutingStores, TenantDefaults, TenantPolicy, WalletGateway,
};

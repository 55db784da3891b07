//! Outbound (Driven) ports for the Lead Routing subsystem.
//!
//! Lookups the routing pass depends on. Every async call is wrapped by the
//! service in a timeout with bounded retries, so implementations only report
//! what went wrong.

use async_trait::async_trait;
use shared_types::entities::{
    GeoPoint, LeadId, LeadRequest, Money, PricingRule, ProviderId, ProviderProfile, ServiceId,
    TenantId,
};
use shared_types::ports::{LeadRepository, MatchRepository, RoutingQueueRepository};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// External collaborators, named in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dependency {
    Directory,
    Wallet,
    Dedupe,
    Geocoder,
    Store,
}

impl Dependency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Wallet => "wallet",
            Self::Dedupe => "dedupe",
            Self::Geocoder => "geocoder",
            Self::Store => "store",
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by an outbound adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The dependency answered but refused the request. Not retried.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl DependencyError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Unavailable(_))
    }
}

/// Read-only provider lookup (Provider Directory).
#[async_trait]
pub trait ProviderDirectory: Send + Sync {
    /// Providers in `tenant_id` with at least one offering for `services`.
    ///
    /// May return extra providers; eligibility is re-checked by the caller.
    async fn find_candidates(
        &self,
        tenant_id: TenantId,
        services: &BTreeSet<ServiceId>,
    ) -> Result<Vec<ProviderProfile>, DependencyError>;

    /// Every pricing rule for the tenant, active or not.
    async fn pricing_rules(&self, tenant_id: TenantId) -> Result<Vec<PricingRule>, DependencyError>;
}

/// Balance read used as the solvency gate. Never mutates.
#[async_trait]
pub trait WalletGateway: Send + Sync {
    /// `None` when the provider has no wallet.
    async fn balance(&self, provider_id: ProviderId) -> Result<Option<Money>, DependencyError>;
}

/// Answer from the dedupe guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupeVerdict {
    /// The fingerprint is now reserved for this lead.
    Allowed,
    Duplicate { existing_lead: LeadId },
}

/// Atomic check-and-reserve over lead fingerprints.
#[async_trait]
pub trait DedupeGate: Send + Sync {
    /// Reserves the lead's fingerprint or reports the lead that owns it.
    async fn check(&self, lead: &LeadRequest) -> Result<DedupeVerdict, DependencyError>;

    /// Confirms the reservation after the lead routed.
    async fn record(&self, lead: &LeadRequest) -> Result<(), DependencyError>;

    /// Drops an unconfirmed reservation so a later attempt can route.
    async fn release(&self, lead: &LeadRequest) -> Result<(), DependencyError>;
}

/// Postal code resolution for leads submitted without coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` when the code is unknown.
    async fn resolve(
        &self,
        tenant_id: TenantId,
        postal_code: &str,
    ) -> Result<Option<GeoPoint>, DependencyError>;
}

/// Per-tenant values the routing pass would otherwise have to guess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantDefaults {
    pub max_sold_count: u32,
    pub fallback_price: Money,
    pub offer_ttl_ms: u64,
}

/// Resolves tenant defaults explicitly instead of from global state.
pub trait TenantPolicy: Send + Sync {
    fn defaults(&self, tenant_id: TenantId) -> TenantDefaults;
}

/// The three repositories a routing pass writes to.
#[derive(Clone)]
pub struct RoutingStores {
    pub leads: Arc<dyn LeadRepository>,
    pub matches: Arc<dyn MatchRepository>,
    pub queue: Arc<dyn RoutingQueueRepository>,
}

impl RoutingStores {
    /// Uses one store for all three repositories.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: LeadRepository + MatchRepository + RoutingQueueRepository + 'static,
    {
        Self {
            leads: store.clone(),
            matches: store.clone(),
            queue: store,
        }
    }
}

// =============================================================================
// TEST DOUBLES
// =============================================================================

#[cfg(test)]
pub use mocks::*;

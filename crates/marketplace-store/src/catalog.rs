//! Static provider catalog.
//!
//! Holds provider profiles, tenant pricing rules, and a postal-code gazetteer.
//! The runtime loads it from a JSON snapshot and wraps it in the routing
//! directory and geocoder ports.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_types::entities::{GeoPoint, PricingRule, ProviderId, ProviderProfile, ServiceId, TenantId};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid coordinates for postal code {0}")]
    InvalidPoint(String),
}

/// A postal code resolved to coordinates for one tenant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PostalEntry {
    pub tenant_id: TenantId,
    pub postal_code: String,
    pub point: GeoPoint,
}

/// Serialized form of the catalog.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSnapshot {
    pub providers: Vec<ProviderProfile>,
    pub pricing_rules: Vec<PricingRule>,
    pub postal_codes: Vec<PostalEntry>,
}

#[derive(Default)]
struct Inner {
    providers: HashMap<(TenantId, ProviderId), ProviderProfile>,
    rules: HashMap<TenantId, Vec<PricingRule>>,
    postal: HashMap<(TenantId, String), GeoPoint>,
}

/// Read-mostly catalog of providers, pricing rules, and postal codes.
#[derive(Default)]
pub struct InMemoryProviderCatalog {
    inner: RwLock<Inner>,
}

fn normalize_postal(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

impl InMemoryProviderCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Result<Self, CatalogError> {
        let catalog = Self::new();
        for entry in snapshot.postal_codes {
            if !entry.point.is_valid() {
                return Err(CatalogError::InvalidPoint(entry.postal_code));
            }
            catalog.add_postal_code(entry.tenant_id, &entry.postal_code, entry.point);
        }
        for profile in snapshot.providers {
            catalog.upsert_provider(profile);
        }
        for rule in snapshot.pricing_rules {
            catalog.add_pricing_rule(rule);
        }
        Ok(catalog)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Self::from_snapshot(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let catalog = Self::from_json(&std::fs::read_to_string(path)?)?;
        let (providers, rules, postal) = catalog.counts();
        info!(
            path = %path.display(),
            providers,
            rules,
            postal_codes = postal,
            "Provider catalog loaded"
        );
        Ok(catalog)
    }

    /// Inserts or replaces a provider profile.
    pub fn upsert_provider(&self, profile: ProviderProfile) {
        self.inner
            .write()
            .providers
            .insert((profile.tenant_id, profile.provider_id), profile);
    }

    pub fn add_pricing_rule(&self, rule: PricingRule) {
        self.inner
            .write()
            .rules
            .entry(rule.tenant_id)
            .or_default()
            .push(rule);
    }

    pub fn add_postal_code(&self, tenant_id: TenantId, postal_code: &str, point: GeoPoint) {
        self.inner
            .write()
            .postal
            .insert((tenant_id, normalize_postal(postal_code)), point);
    }

    pub fn provider(&self, tenant_id: TenantId, provider_id: ProviderId) -> Option<ProviderProfile> {
        self.inner
            .read()
            .providers
            .get(&(tenant_id, provider_id))
            .cloned()
    }

    /// Providers in `tenant_id` with an active offering for any of `services`,
    /// ordered by provider id.
    pub fn providers_offering(
        &self,
        tenant_id: TenantId,
        services: &BTreeSet<ServiceId>,
    ) -> Vec<ProviderProfile> {
        let inner = self.inner.read();
        let mut found: Vec<_> = inner
            .providers
            .values()
            .filter(|p| p.tenant_id == tenant_id && p.offers_any(services))
            .cloned()
            .collect();
        found.sort_by_key(|p| p.provider_id);
        found
    }

    pub fn pricing_rules(&self, tenant_id: TenantId) -> Vec<PricingRule> {
        self.inner
            .read()
            .rules
            .get(&tenant_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Resolves a postal code, ignoring case and whitespace.
    pub fn locate(&self, tenant_id: TenantId, postal_code: &str) -> Option<GeoPoint> {
        self.inner
            .read()
            .postal
            .get(&(tenant_id, normalize_postal(postal_code)))
            .copied()
    }

    /// `(providers, pricing rules, postal codes)`.
    pub fn counts(&self) -> (usize, usize, usize) {
        let inner = self.inner.read();
        (
            inner.providers.len(),
            inner.rules.values().map(Vec::len).sum(),
            inner.postal.len(),
        )
    }
}

//! # Catalog Directory
//!
//! Serves the static provider catalog as the routing engine's provider
//! directory and postal-code geocoder.

use async_trait::async_trait;
use lm_03_lead_routing::{DependencyError, Geocoder, ProviderDirectory};
use marketplace_store::InMemoryProviderCatalog;
use shared_types::entities::{GeoPoint, PricingRule, ProviderProfile, ServiceId, TenantId};
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct CatalogDirectory {
    catalog: Arc<InMemoryProviderCatalog>,
}

impl CatalogDirectory {
    pub fn new(catalog: Arc<InMemoryProviderCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl ProviderDirectory for CatalogDirectory {
    async fn find_candidates(
        &self,
        tenant_id: TenantId,
        services: &BTreeSet<ServiceId>,
    ) -> Result<Vec<ProviderProfile>, DependencyError> {
        Ok(self.catalog.providers_offering(tenant_id, services))
    }

    async fn pricing_rules(&self, tenant_id: TenantId) -> Result<Vec<PricingRule>, DependencyError> {
        Ok(self.catalog.pricing_rules(tenant_id))
    }
}

#[async_trait]
impl Geocoder for CatalogDirectory {
    async fn resolve(
        &self,
        tenant_id: TenantId,
        postal_code: &str,
    ) -> Result<Option<GeoPoint>, DependencyError> {
        Ok(self.catalog.locate(tenant_id, postal_code))
    }
}

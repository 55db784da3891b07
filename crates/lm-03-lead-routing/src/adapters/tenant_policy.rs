//! Config-backed tenant policy.

use parking_lot::RwLock;
use shared_types::entities::TenantId;
use std::collections::HashMap;

use crate::config::RoutingConfig;
use crate::ports::{TenantDefaults, TenantPolicy};

/// Serves [`RoutingConfig`] values to every tenant, with optional
/// per-tenant overrides.
pub struct ConfigTenantPolicy {
    base: TenantDefaults,
    overrides: RwLock<HashMap<TenantId, TenantDefaults>>,
}

impl ConfigTenantPolicy {
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            base: TenantDefaults {
                max_sold_count: config.default_max_sold_count.max(1),
                fallback_price: config.fallback_price,
                offer_ttl_ms: config.offer_ttl_ms,
            },
            overrides: RwLock::new(HashMap::new()),
        }
    }

    pub fn set_override(&self, tenant_id: TenantId, defaults: TenantDefaults) {
        self.overrides.write().insert(tenant_id, defaults);
    }

    pub fn with_override(self, tenant_id: TenantId, defaults: TenantDefaults) -> Self {
        self.set_override(tenant_id, defaults);
        self
    }
}

impl TenantPolicy for ConfigTenantPolicy {
    fn defaults(&self, tenant_id: TenantId) -> TenantDefaults {
        self.overrides
            .read()
            .get(&tenant_id)
            .cloned()
            .unwrap_or_else(|| self.base.clone())
    }
}

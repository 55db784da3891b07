//! # Inbound Ports

use crate::domain::{DedupeDecision, DedupeError, Fingerprint};
use async_trait::async_trait;
use shared_types::entities::{LeadId, LeadRequest, TenantId, Timestamp};

/// Dedupe Guard API - inbound port.
#[async_trait]
pub trait DedupeGuardApi: Send + Sync {
    /// Fingerprint of a lead under the configured bucket width.
    fn fingerprint(&self, lead: &LeadRequest) -> Fingerprint;

    /// Atomic check-and-reserve. `Allowed` means the caller now holds the
    /// fingerprint until it records or releases it.
    async fn check(
        &self,
        fingerprint: &Fingerprint,
        tenant_id: TenantId,
        lead_id: LeadId,
    ) -> Result<DedupeDecision, DedupeError>;

    /// Confirms the fingerprint after a routing pass created offers.
    async fn record(
        &self,
        fingerprint: &Fingerprint,
        tenant_id: TenantId,
        lead_id: LeadId,
    ) -> Result<(), DedupeError>;

    /// Drops an unconfirmed reservation held by `lead_id`.
    async fn release(&self, fingerprint: &Fingerprint, lead_id: LeadId)
        -> Result<bool, DedupeError>;

    /// Deletes entries created before `cutoff`.
    async fn cleanup(&self, cutoff: Timestamp) -> Result<u64, DedupeError>;
}

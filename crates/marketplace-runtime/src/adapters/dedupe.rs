//! # Dedupe Guard Adapter
//!
//! Fingerprints the lead on every call so the routing engine never sees
//! the fingerprint format.

use async_trait::async_trait;
use lm_02_dedupe_guard::{DedupeDecision, DedupeError, DedupeGuardApi};
use lm_03_lead_routing::{DedupeGate, DedupeVerdict, DependencyError};
use lm_04_offer_lifecycle::{DedupeLogCleaner, GatewayError};
use shared_types::entities::{LeadRequest, Timestamp};
use std::sync::Arc;
use tracing::debug;

pub struct DedupeGuardAdapter {
    guard: Arc<dyn DedupeGuardApi>,
}

impl DedupeGuardAdapter {
    pub fn new(guard: Arc<dyn DedupeGuardApi>) -> Self {
        Self { guard }
    }
}

fn dependency_error(err: DedupeError) -> DependencyError {
    match err {
        DedupeError::Unavailable(message) => DependencyError::Unavailable(message),
        other => DependencyError::Rejected(other.to_string()),
    }
}

#[async_trait]
impl DedupeGate for DedupeGuardAdapter {
    async fn check(&self, lead: &LeadRequest) -> Result<DedupeVerdict, DependencyError> {
        let fingerprint = self.guard.fingerprint(lead);
        let decision = self
            .guard
            .check(&fingerprint, lead.tenant_id, lead.id)
            .await
            .map_err(dependency_error)?;
        Ok(match decision {
            DedupeDecision::Allowed => DedupeVerdict::Allowed,
            DedupeDecision::Duplicate { existing_lead } => DedupeVerdict::Duplicate { existing_lead },
        })
    }

    async fn record(&self, lead: &LeadRequest) -> Result<(), DependencyError> {
        let fingerprint = self.guard.fingerprint(lead);
        self.guard
            .record(&fingerprint, lead.tenant_id, lead.id)
            .await
            .map_err(dependency_error)
    }

    async fn release(&self, lead: &LeadRequest) -> Result<(), DependencyError> {
        let fingerprint = self.guard.fingerprint(lead);
        let released = self
            .guard
            .release(&fingerprint, lead.id)
            .await
            .map_err(dependency_error)?;
        if !released {
            debug!(lead_id = %lead.id, "No reservation to release");
        }
        Ok(())
    }
}

#[async_trait]
impl DedupeLogCleaner for DedupeGuardAdapter {
    async fn purge_before(&self, cutoff: Timestamp) -> Result<u64, GatewayError> {
        self.guard.cleanup(cutoff).await.map_err(|e| match e {
            DedupeError::Unavailable(message) => GatewayError::Unavailable(message),
            other => GatewayError::Rejected(other.to_string()),
        })
    }
}

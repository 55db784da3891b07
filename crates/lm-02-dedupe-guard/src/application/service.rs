//! # Dedupe Guard Service

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::entities::{LeadId, LeadRequest, TenantId, Timestamp};
use shared_types::time::TimeSource;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::DedupeConfig;
use crate::domain::{DedupeDecision, DedupeError, DedupeLog, Fingerprint};
use crate::ports::DedupeGuardApi;

/// Dedupe Guard Service - in-process implementation of [`DedupeGuardApi`].
pub struct DedupeGuardService {
    config: DedupeConfig,
    log: Mutex<DedupeLog>,
    time_source: Arc<dyn TimeSource>,
}

impl DedupeGuardService {
    pub fn new(config: DedupeConfig, time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            config,
            log: Mutex::new(DedupeLog::new()),
            time_source,
        }
    }

    pub fn config(&self) -> &DedupeConfig {
        &self.config
    }

    /// Number of entries currently stored.
    pub fn entry_count(&self) -> usize {
        self.log.lock().len()
    }

    /// Whether a live entry exists for `fingerprint`.
    pub fn is_live(&self, fingerprint: &Fingerprint) -> bool {
        let now = self.time_source.now();
        self.log
            .lock()
            .get(fingerprint)
            .is_some_and(|entry| entry.is_live(now, self.config.ttl_ms))
    }
}

#[async_trait]
impl DedupeGuardApi for DedupeGuardService {
    fn fingerprint(&self, lead: &LeadRequest) -> Fingerprint {
        Fingerprint::for_lead(lead, self.config.bucket_ms)
    }

    async fn check(
        &self,
        fingerprint: &Fingerprint,
        tenant_id: TenantId,
        lead_id: LeadId,
    ) -> Result<DedupeDecision, DedupeError> {
        let now = self.time_source.now();
        let decision = self.log.lock().check_and_reserve(
            fingerprint,
            tenant_id,
            lead_id,
            now,
            self.config.ttl_ms,
        );

        if let DedupeDecision::Duplicate { existing_lead } = decision {
            info!(
                lead_id = %lead_id,
                existing_lead = %existing_lead,
                fingerprint = %fingerprint,
                "Duplicate submission suppressed"
            );
        }
        Ok(decision)
    }

    async fn record(
        &self,
        fingerprint: &Fingerprint,
        tenant_id: TenantId,
        lead_id: LeadId,
    ) -> Result<(), DedupeError> {
        let now = self.time_source.now();
        self.log.lock().confirm(fingerprint, tenant_id, lead_id, now)?;
        debug!(lead_id = %lead_id, fingerprint = %fingerprint, "Fingerprint recorded");
        Ok(())
    }

    async fn release(
        &self,
        fingerprint: &Fingerprint,
        lead_id: LeadId,
    ) -> Result<bool, DedupeError> {
        let released = self.log.lock().release(fingerprint, lead_id);
        if released {
            debug!(lead_id = %lead_id, fingerprint = %fingerprint, "Reservation released");
        }
        Ok(released)
    }

    async fn cleanup(&self, cutoff: Timestamp) -> Result<u64, DedupeError> {
        Ok(self.log.lock().purge_before(cutoff))
    }
}

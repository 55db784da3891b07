//! # Dedupe Entities

use super::fingerprint::Fingerprint;
use serde::{Deserialize, Serialize};
use shared_types::entities::{LeadId, TenantId, Timestamp};

/// One fingerprint seen recently.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupeLogEntry {
    pub fingerprint: Fingerprint,
    pub tenant_id: TenantId,
    /// Lead that reserved or recorded this fingerprint.
    pub lead_id: LeadId,
    pub created_at: Timestamp,
    /// `false` while the owning routing pass is still in flight.
    pub confirmed: bool,
}

impl DedupeLogEntry {
    /// Live entries suppress other leads with the same fingerprint.
    pub fn is_live(&self, now: Timestamp, ttl_ms: u64) -> bool {
        now < self.created_at.saturating_add(ttl_ms)
    }
}

/// Outcome of a dedupe check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DedupeDecision {
    /// The caller holds the fingerprint and may route.
    Allowed,
    /// Another lead already holds a live entry.
    Duplicate { existing_lead: LeadId },
}

impl DedupeDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

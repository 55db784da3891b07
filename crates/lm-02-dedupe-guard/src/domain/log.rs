//! # Dedupe Log
//!
//! In-memory fingerprint table. All methods are synchronous and expect the
//! caller to hold exclusive access, which is what makes `check_and_reserve`
//! atomic.

use super::entities::{DedupeDecision, DedupeLogEntry};
use super::errors::DedupeError;
use super::fingerprint::Fingerprint;
use shared_types::entities::{LeadId, TenantId, Timestamp};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct DedupeLog {
    entries: HashMap<Fingerprint, DedupeLogEntry>,
}

impl DedupeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&DedupeLogEntry> {
        self.entries.get(fingerprint)
    }

    /// Reserves `fingerprint` for `lead_id` unless another lead holds a
    /// live entry. The same lead re-checking is always allowed.
    pub fn check_and_reserve(
        &mut self,
        fingerprint: &Fingerprint,
        tenant_id: TenantId,
        lead_id: LeadId,
        now: Timestamp,
        ttl_ms: u64,
    ) -> DedupeDecision {
        if let Some(existing) = self.entries.get(fingerprint) {
            if existing.is_live(now, ttl_ms) && existing.lead_id != lead_id {
                return DedupeDecision::Duplicate {
                    existing_lead: existing.lead_id,
                };
            }
            if existing.lead_id == lead_id {
                return DedupeDecision::Allowed;
            }
        }

        self.entries.insert(
            fingerprint.clone(),
            DedupeLogEntry {
                fingerprint: fingerprint.clone(),
                tenant_id,
                lead_id,
                created_at: now,
                confirmed: false,
            },
        );
        DedupeDecision::Allowed
    }

    /// Confirms the entry after a successful routing pass.
    pub fn confirm(
        &mut self,
        fingerprint: &Fingerprint,
        tenant_id: TenantId,
        lead_id: LeadId,
        now: Timestamp,
    ) -> Result<(), DedupeError> {
        match self.entries.get_mut(fingerprint) {
            Some(entry) if entry.lead_id == lead_id => {
                entry.confirmed = true;
                Ok(())
            }
            Some(entry) => Err(DedupeError::NotOwner {
                fingerprint: fingerprint.to_string(),
                owner: entry.lead_id.0,
            }),
            None => {
                self.entries.insert(
                    fingerprint.clone(),
                    DedupeLogEntry {
                        fingerprint: fingerprint.clone(),
                        tenant_id,
                        lead_id,
                        created_at: now,
                        confirmed: true,
                    },
                );
                Ok(())
            }
        }
    }

    /// Drops an unconfirmed reservation held by `lead_id`.
    ///
    /// Returns `true` if an entry was removed.
    pub fn release(&mut self, fingerprint: &Fingerprint, lead_id: LeadId) -> bool {
        let removable = self
            .entries
            .get(fingerprint)
            .is_some_and(|entry| entry.lead_id == lead_id && !entry.confirmed);
        if removable {
            self.entries.remove(fingerprint);
        }
        removable
    }

    /// Deletes entries created before `cutoff`. Returns the number removed.
    pub fn purge_before(&mut self, cutoff: Timestamp) -> u64 {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.created_at >= cutoff);
        (before - self.entries.len()) as u64
    }
}

//! In-memory marketplace store.

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::entities::{
    LeadId, LeadRequest, LeadResolution, LeadStatus, Lease, Match, MatchId, MatchStatus,
    MatchUpdate, ProviderId, QueueStatus, RoutingQueueEntry, TenantId, Timestamp, WorkerId,
};
use shared_types::errors::StoreError;
use shared_types::ports::{
    ClaimOutcome, LeadRepository, MatchRepository, OfferInsert, RoutingQueueRepository,
    SaleOutcome,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, trace};

#[derive(Default)]
struct State {
    leads: HashMap<LeadId, LeadRequest>,
    matches: HashMap<MatchId, Match>,
    /// Offer ids per lead, in insertion order.
    by_lead: HashMap<LeadId, Vec<MatchId>>,
    /// Uniqueness index over active offers.
    active_pairs: HashMap<(LeadId, ProviderId), MatchId>,
    /// Queue entries keyed by their monotonically increasing id.
    queue: BTreeMap<u64, RoutingQueueEntry>,
    /// The single open queue entry per lead.
    open_entries: HashMap<LeadId, u64>,
    next_queue_id: u64,
}

impl State {
    fn lead_mut(&mut self, id: LeadId) -> Result<&mut LeadRequest, StoreError> {
        self.leads
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("lead {id}")))
    }

    /// Applies `update` and keeps the active-pair index consistent.
    fn apply_update(&mut self, id: MatchId, update: &MatchUpdate) -> Option<Match> {
        let offer = self.matches.get_mut(&id)?;
        offer.apply(update);
        let offer = offer.clone();
        if !offer.is_active() {
            let key = (offer.lead_id, offer.provider_id);
            if self.active_pairs.get(&key) == Some(&id) {
                self.active_pairs.remove(&key);
            }
        }
        Some(offer)
    }

    fn open_entry_mut(&mut self, lead_id: LeadId) -> Option<&mut RoutingQueueEntry> {
        let id = *self.open_entries.get(&lead_id)?;
        self.queue.get_mut(&id)
    }

    fn close_entry(&mut self, lead_id: LeadId, status: QueueStatus, now: Timestamp) {
        if let Some(id) = self.open_entries.remove(&lead_id) {
            if let Some(entry) = self.queue.get_mut(&id) {
                entry.status = status;
                entry.processed_at = Some(now);
            }
        }
    }
}

/// Lead, offer, and queue repositories behind one mutex.
#[derive(Default)]
pub struct InMemoryMarketplaceStore {
    state: Mutex<State>,
    /// Calls left that fail with `Unavailable`.
    injected_failures: AtomicU32,
}

impl InMemoryMarketplaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` repository calls fail with `StoreError::Unavailable`.
    pub fn inject_failures(&self, n: u32) {
        self.injected_failures.store(n, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        let failed = self
            .injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        Ok(())
    }

    pub fn lead_count(&self) -> usize {
        self.state.lock().leads.len()
    }

    pub fn match_count(&self) -> usize {
        self.state.lock().matches.len()
    }

    /// Every stored offer, oldest first.
    pub fn all_matches(&self) -> Vec<Match> {
        let state = self.state.lock();
        let mut matches: Vec<_> = state.matches.values().cloned().collect();
        matches.sort_by_key(|m| (m.offered_at, m.id));
        matches
    }

    /// Every queue entry regardless of status, oldest first.
    pub fn queue_entries(&self) -> Vec<RoutingQueueEntry> {
        self.state.lock().queue.values().cloned().collect()
    }
}

#[async_trait]
impl LeadRepository for InMemoryMarketplaceStore {
    async fn insert_lead(&self, lead: LeadRequest) -> Result<(), StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        if state.leads.contains_key(&lead.id) {
            return Err(StoreError::Conflict(format!("lead {} exists", lead.id)));
        }
        trace!(lead_id = %lead.id, "Lead inserted");
        state.leads.insert(lead.id, lead);
        Ok(())
    }

    async fn get_lead(&self, id: LeadId) -> Result<Option<LeadRequest>, StoreError> {
        self.check_available()?;
        Ok(self.state.lock().leads.get(&id).cloned())
    }

    async fn claim_lead(
        &self,
        id: LeadId,
        owner: &WorkerId,
        now: Timestamp,
        lease_ms: u64,
    ) -> Result<ClaimOutcome, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        let Some(lead) = state.leads.get_mut(&id) else {
            return Ok(ClaimOutcome::NotFound);
        };
        if !lead.is_claimable_at(now) {
            return Ok(if lead.status == LeadStatus::Routing {
                ClaimOutcome::Busy
            } else {
                ClaimOutcome::NotClaimable(lead.status)
            });
        }

        lead.status = LeadStatus::Routing;
        lead.lease = Some(Lease {
            owner: owner.clone(),
            expires_at: now.saturating_add(lease_ms),
        });
        lead.attempts += 1;
        Ok(ClaimOutcome::Claimed(lead.clone()))
    }

    async fn release_lead(&self, id: LeadId, owner: &WorkerId) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        let lead = state.lead_mut(id)?;
        if !lead.is_leased_by(owner) {
            return Ok(false);
        }
        lead.status = LeadStatus::Queued;
        lead.lease = None;
        Ok(true)
    }

    async fn renew_lease(
        &self,
        id: LeadId,
        owner: &WorkerId,
        now: Timestamp,
        lease_ms: u64,
    ) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        let lead = state.lead_mut(id)?;
        if !lead.is_leased_by(owner) {
            return Ok(false);
        }
        lead.lease = Some(Lease {
            owner: owner.clone(),
            expires_at: now.saturating_add(lease_ms),
        });
        Ok(true)
    }

    async fn resolve_max_sold_count(
        &self,
        id: LeadId,
        default_cap: u32,
    ) -> Result<u32, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        let lead = state.lead_mut(id)?;
        if lead.max_sold_count == 0 {
            lead.max_sold_count = default_cap.max(1);
            trace!(lead_id = %id, max_sold_count = lead.max_sold_count, "Offer cap defaulted");
        }
        Ok(lead.max_sold_count)
    }

    async fn finish_lead(
        &self,
        id: LeadId,
        owner: &WorkerId,
        resolution: LeadResolution,
        now: Timestamp,
    ) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        let lead = state.lead_mut(id)?;
        if !lead.is_leased_by(owner) || !lead.status.can_transition_to(resolution.status) {
            return Ok(false);
        }
        lead.status = resolution.status;
        lead.status_reason = resolution.reason;
        lead.lease = None;
        if matches!(resolution.status, LeadStatus::Routed | LeadStatus::Partial) {
            lead.routed_at = Some(now);
        }
        Ok(true)
    }

    async fn requeue_lead(&self, id: LeadId) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        let lead = state.lead_mut(id)?;
        if !matches!(lead.status, LeadStatus::Routed | LeadStatus::Partial) {
            return Ok(false);
        }
        lead.status = LeadStatus::Queued;
        lead.status_reason = None;
        lead.requeue_count += 1;
        Ok(true)
    }

    async fn record_sale(&self, id: LeadId) -> Result<SaleOutcome, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        let lead = state.lead_mut(id)?;
        if lead.is_sold_out() {
            return Ok(SaleOutcome::SoldOut);
        }
        lead.sold_count += 1;
        Ok(SaleOutcome::Sold {
            sold_count: lead.sold_count,
            max_sold_count: lead.max_sold_count,
        })
    }

    async fn revert_sale(&self, id: LeadId) -> Result<(), StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        let lead = state.lead_mut(id)?;
        lead.sold_count = lead.sold_count.saturating_sub(1);
        Ok(())
    }

    async fn stale_leases(&self, now: Timestamp) -> Result<Vec<LeadId>, StoreError> {
        self.check_available()?;
        let state = self.state.lock();
        let mut stale: Vec<_> = state
            .leads
            .values()
            .filter(|lead| lead.status == LeadStatus::Routing && lead.is_claimable_at(now))
            .map(|lead| lead.id)
            .collect();
        stale.sort_unstable();
        Ok(stale)
    }
}

#[async_trait]
impl MatchRepository for InMemoryMarketplaceStore {
    async fn insert_offer(&self, offer: Match) -> Result<OfferInsert, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        let key = (offer.lead_id, offer.provider_id);
        if let Some(existing) = state.active_pairs.get(&key) {
            return Ok(OfferInsert::DuplicateActive(*existing));
        }

        let id = offer.id;
        if offer.is_active() {
            state.active_pairs.insert(key, id);
        }
        state.by_lead.entry(offer.lead_id).or_default().push(id);
        state.matches.insert(id, offer);
        Ok(OfferInsert::Inserted(id))
    }

    async fn get_match(&self, id: MatchId) -> Result<Option<Match>, StoreError> {
        self.check_available()?;
        Ok(self.state.lock().matches.get(&id).cloned())
    }

    async fn matches_for_lead(&self, lead_id: LeadId) -> Result<Vec<Match>, StoreError> {
        self.check_available()?;
        let state = self.state.lock();
        Ok(state
            .by_lead
            .get(&lead_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.matches.get(id).cloned())
            .collect())
    }

    async fn offers_since(
        &self,
        provider_id: ProviderId,
        since: Timestamp,
    ) -> Result<u32, StoreError> {
        self.check_available()?;
        let state = self.state.lock();
        let count = state
            .matches
            .values()
            .filter(|m| m.provider_id == provider_id && m.offered_at >= since)
            .count();
        Ok(count as u32)
    }

    async fn transition(
        &self,
        id: MatchId,
        from: &[MatchStatus],
        update: MatchUpdate,
    ) -> Result<Option<Match>, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        let current = state
            .matches
            .get(&id)
            .map(|m| m.status)
            .ok_or_else(|| StoreError::NotFound(format!("match {id}")))?;
        if !from.contains(&current) {
            return Ok(None);
        }
        Ok(state.apply_update(id, &update))
    }

    async fn claim_due_reminders(
        &self,
        now: Timestamp,
        window_ms: u64,
    ) -> Result<Vec<Match>, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        let mut due: Vec<Match> = state
            .matches
            .values_mut()
            .filter(|m| m.reminder_due(now, window_ms))
            .map(|m| {
                m.reminded = true;
                m.clone()
            })
            .collect();
        due.sort_by_key(|m| (m.expires_at, m.id));
        if !due.is_empty() {
            debug!(count = due.len(), "Reminders claimed");
        }
        Ok(due)
    }

    async fn expire_due_offers(&self, now: Timestamp) -> Result<Vec<Match>, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        let mut due: Vec<(Timestamp, MatchId)> = state
            .matches
            .values()
            .filter(|m| m.is_active() && m.is_expired_at(now))
            .map(|m| (m.expires_at, m.id))
            .collect();
        due.sort_unstable();

        let update = MatchUpdate::to(MatchStatus::Expired, now);
        Ok(due
            .into_iter()
            .filter_map(|(_, id)| state.apply_update(id, &update))
            .collect())
    }

    async fn expire_active_for_lead(
        &self,
        lead_id: LeadId,
        now: Timestamp,
    ) -> Result<Vec<Match>, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        let active: Vec<MatchId> = state
            .by_lead
            .get(&lead_id)
            .into_iter()
            .flatten()
            .filter(|id| state.matches.get(id).is_some_and(Match::is_active))
            .copied()
            .collect();

        let update = MatchUpdate::to(MatchStatus::Expired, now);
        Ok(active
            .into_iter()
            .filter_map(|id| state.apply_update(id, &update))
            .collect())
    }
}

#[async_trait]
impl RoutingQueueRepository for InMemoryMarketplaceStore {
    async fn enqueue(
        &self,
        tenant_id: TenantId,
        lead_id: LeadId,
        now: Timestamp,
    ) -> Result<RoutingQueueEntry, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        if let Some(lead) = state.leads.get_mut(&lead_id) {
            if lead.status == LeadStatus::New {
                lead.status = LeadStatus::Queued;
            }
        }
        if let Some(entry) = state.open_entry_mut(lead_id) {
            return Ok(entry.clone());
        }

        state.next_queue_id += 1;
        let entry = RoutingQueueEntry {
            id: state.next_queue_id,
            tenant_id,
            lead_id,
            status: QueueStatus::Pending,
            enqueued_at: now,
            processed_at: None,
            attempts: 0,
        };
        state.open_entries.insert(lead_id, entry.id);
        state.queue.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn mark_processing(&self, lead_id: LeadId) -> Result<(), StoreError> {
        self.check_available()?;
        if let Some(entry) = self.state.lock().open_entry_mut(lead_id) {
            entry.status = QueueStatus::Processing;
            entry.attempts += 1;
        }
        Ok(())
    }

    async fn mark_pending(&self, lead_id: LeadId) -> Result<(), StoreError> {
        self.check_available()?;
        if let Some(entry) = self.state.lock().open_entry_mut(lead_id) {
            entry.status = QueueStatus::Pending;
        }
        Ok(())
    }

    async fn mark_completed(&self, lead_id: LeadId, now: Timestamp) -> Result<(), StoreError> {
        self.check_available()?;
        self.state
            .lock()
            .close_entry(lead_id, QueueStatus::Completed, now);
        Ok(())
    }

    async fn mark_dead(&self, lead_id: LeadId, now: Timestamp) -> Result<(), StoreError> {
        self.check_available()?;
        self.state.lock().close_entry(lead_id, QueueStatus::Dead, now);
        Ok(())
    }

    async fn pending(&self, limit: usize) -> Result<Vec<RoutingQueueEntry>, StoreError> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .queue
            .values()
            .filter(|entry| entry.status == QueueStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn purge_completed_before(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        let before = state.queue.len();
        state.queue.retain(|_, entry| {
            !(entry.status == QueueStatus::Completed
                && entry.processed_at.is_some_and(|at| at < cutoff))
        });
        Ok((before - state.queue.len()) as u64)
    }
}

//! # Repository Ports
//!
//! Persistence contracts for leads, offers, and the routing queue.
//!
//! Every state change is a guarded transition evaluated atomically by the
//! store. Callers never read a row, decide, and write it back; the predicate
//! travels with the write so concurrent workers and overlapping scheduler
//! runs cannot both win.

use crate::entities::{
    LeadId, LeadRequest, LeadResolution, LeadStatus, Match, MatchId, MatchStatus, MatchUpdate,
    ProviderId, RoutingQueueEntry, TenantId, Timestamp, WorkerId,
};
use crate::errors::StoreError;
use async_trait::async_trait;

/// Result of an attempt to claim a lead for routing.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// The caller now holds the lease. Carries the lead as claimed.
    Claimed(LeadRequest),
    /// Another worker holds an unexpired lease.
    Busy,
    /// The lead is in a status that cannot be claimed.
    NotClaimable(LeadStatus),
    NotFound,
}

impl ClaimOutcome {
    pub fn is_claimed(&self) -> bool {
        matches!(self, Self::Claimed(_))
    }
}

/// Result of inserting an offer under the active-pair uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferInsert {
    Inserted(MatchId),
    /// An active offer for the same `(lead, provider)` already exists.
    DuplicateActive(MatchId),
}

/// Result of recording an accepted sale against a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaleOutcome {
    Sold { sold_count: u32, max_sold_count: u32 },
    /// The lead already reached `max_sold_count`.
    SoldOut,
}

/// Lead persistence.
#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// Inserts a new lead. Fails with `Conflict` if the id exists.
    async fn insert_lead(&self, lead: LeadRequest) -> Result<(), StoreError>;

    async fn get_lead(&self, id: LeadId) -> Result<Option<LeadRequest>, StoreError>;

    /// Atomically moves a claimable lead to `routing` under a lease.
    ///
    /// Claimable means `new`, `queued`, or `routing` with an expired lease.
    /// A successful claim increments `attempts`.
    async fn claim_lead(
        &self,
        id: LeadId,
        owner: &WorkerId,
        now: Timestamp,
        lease_ms: u64,
    ) -> Result<ClaimOutcome, StoreError>;

    /// Returns a leased lead to `queued`. No-op unless `owner` holds the lease.
    async fn release_lead(&self, id: LeadId, owner: &WorkerId) -> Result<bool, StoreError>;

    /// Pushes the lease expiry to `now + lease_ms`.
    ///
    /// Returns `false` without writing if `owner` no longer holds the lease.
    async fn renew_lease(
        &self,
        id: LeadId,
        owner: &WorkerId,
        now: Timestamp,
        lease_ms: u64,
    ) -> Result<bool, StoreError>;

    /// Returns the lead's offer cap, storing `default_cap` first if the lead
    /// has none (zero). Acceptance reads the stored value.
    async fn resolve_max_sold_count(&self, id: LeadId, default_cap: u32)
        -> Result<u32, StoreError>;

    /// Writes the routing outcome and drops the lease.
    ///
    /// Returns `false` without writing if `owner` no longer holds the lease.
    async fn finish_lead(
        &self,
        id: LeadId,
        owner: &WorkerId,
        resolution: LeadResolution,
        now: Timestamp,
    ) -> Result<bool, StoreError>;

    /// Moves a `routed`/`partial` lead back to `queued` and bumps
    /// `requeue_count`. Returns `false` if the lead is in any other status.
    async fn requeue_lead(&self, id: LeadId) -> Result<bool, StoreError>;

    /// Increments `sold_count` unless the lead is sold out.
    async fn record_sale(&self, id: LeadId) -> Result<SaleOutcome, StoreError>;

    /// Reverses one sale after a refund. Never drops below zero.
    async fn revert_sale(&self, id: LeadId) -> Result<(), StoreError>;

    /// Leads stuck in `routing` whose lease has expired.
    async fn stale_leases(&self, now: Timestamp) -> Result<Vec<LeadId>, StoreError>;
}

/// Offer persistence.
#[async_trait]
pub trait MatchRepository: Send + Sync {
    /// Inserts an offer unless an active one exists for the same pair.
    async fn insert_offer(&self, offer: Match) -> Result<OfferInsert, StoreError>;

    async fn get_match(&self, id: MatchId) -> Result<Option<Match>, StoreError>;

    async fn matches_for_lead(&self, lead_id: LeadId) -> Result<Vec<Match>, StoreError>;

    /// Number of offers made to `provider_id` at or after `since`.
    async fn offers_since(
        &self,
        provider_id: ProviderId,
        since: Timestamp,
    ) -> Result<u32, StoreError>;

    /// Applies `update` only if the match is currently in one of `from`.
    ///
    /// Returns the updated match, or `None` if the guard did not hold.
    /// Fails with `NotFound` if the match does not exist.
    async fn transition(
        &self,
        id: MatchId,
        from: &[MatchStatus],
        update: MatchUpdate,
    ) -> Result<Option<Match>, StoreError>;

    /// Marks every active, unreminded offer expiring in `(now, now + window_ms]`
    /// as reminded and returns the rows it flipped.
    async fn claim_due_reminders(
        &self,
        now: Timestamp,
        window_ms: u64,
    ) -> Result<Vec<Match>, StoreError>;

    /// Moves every active offer with `expires_at <= now` to `expired` and
    /// returns the rows it flipped.
    async fn expire_due_offers(&self, now: Timestamp) -> Result<Vec<Match>, StoreError>;

    /// Expires every remaining active offer for one lead.
    async fn expire_active_for_lead(
        &self,
        lead_id: LeadId,
        now: Timestamp,
    ) -> Result<Vec<Match>, StoreError>;
}

/// Routing work queue persistence.
#[async_trait]
pub trait RoutingQueueRepository: Send + Sync {
    /// Adds a pending entry for the lead.
    ///
    /// Idempotent: an existing open entry for the same lead is returned as is.
    /// Implementations also move a `new` lead to `queued`.
    async fn enqueue(
        &self,
        tenant_id: TenantId,
        lead_id: LeadId,
        now: Timestamp,
    ) -> Result<RoutingQueueEntry, StoreError>;

    async fn mark_processing(&self, lead_id: LeadId) -> Result<(), StoreError>;

    /// Returns the open entry to `pending` for another attempt.
    async fn mark_pending(&self, lead_id: LeadId) -> Result<(), StoreError>;

    async fn mark_completed(&self, lead_id: LeadId, now: Timestamp) -> Result<(), StoreError>;

    async fn mark_dead(&self, lead_id: LeadId, now: Timestamp) -> Result<(), StoreError>;

    /// Oldest pending entries first.
    async fn pending(&self, limit: usize) -> Result<Vec<RoutingQueueEntry>, StoreError>;

    /// Deletes `completed` entries processed before `cutoff`.
    async fn purge_completed_before(&self, cutoff: Timestamp) -> Result<u64, StoreError>;
}

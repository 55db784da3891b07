//! # Marketplace Entities
//!
//! Leads, offers, provider profiles, and routing queue entries.
//!
//! ## Lead State Machine
//!
//! ```text
//! [NEW] ──enqueue──→ [QUEUED] ──claim──→ [ROUTING] ──┬──→ [ROUTED]
//!   │                   ↑                   │         ├──→ [PARTIAL]
//!   └──────claim────────┼──────────────────→┘         └──→ [DEAD]
//!                       │                   │
//!                       └──release/retry────┘
//! ```
//!
//! `ROUTED`/`PARTIAL` may return to `QUEUED` only through an explicit requeue.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Timestamp in milliseconds since UNIX epoch.
pub type Timestamp = u64;

/// Monetary amount. Never floating point.
pub type Money = Decimal;

/// Milliseconds in one minute.
pub const MS_PER_MINUTE: u64 = 60_000;
/// Milliseconds in one hour.
pub const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;
/// Milliseconds in one day.
pub const MS_PER_DAY: u64 = 24 * MS_PER_HOUR;

/// Default number of concurrent offers a lead may have.
pub const DEFAULT_MAX_SOLD_COUNT: u32 = 3;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

numeric_id!(
    /// Marketplace tenant (workspace) identifier.
    TenantId
);
numeric_id!(
    /// Lead request identifier.
    LeadId
);
numeric_id!(
    /// Service provider identifier.
    ProviderId
);
numeric_id!(
    /// Service catalogue identifier.
    ServiceId
);

/// Offer identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub Uuid);

impl MatchId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a routing worker holding a lease.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub String);

impl WorkerId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// LOCATION
// =============================================================================

/// A point on the earth's surface in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Latitude within ±90 and longitude within ±180, both finite.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Where the consumer needs the service performed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadLocation {
    /// Coordinates, when intake could supply them.
    pub point: Option<GeoPoint>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
}

impl LeadLocation {
    pub fn at(point: GeoPoint) -> Self {
        Self {
            point: Some(point),
            ..Default::default()
        }
    }

    pub fn postal(postal_code: impl Into<String>) -> Self {
        Self {
            postal_code: Some(postal_code.into()),
            ..Default::default()
        }
    }
}

// =============================================================================
// LEAD REQUEST
// =============================================================================

/// Consumer contact details captured at intake.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerContact {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ConsumerContact {
    pub fn new(
        name: Option<&str>,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Self {
        Self {
            name: name.map(str::to_owned),
            email: email.map(str::to_owned),
            phone: phone.map(str::to_owned),
        }
    }

    /// True when neither email nor phone is present.
    pub fn is_anonymous(&self) -> bool {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        blank(&self.email) && blank(&self.phone)
    }
}

/// Budget range. A missing bound means unbounded on that side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetRange {
    pub min: Option<Money>,
    pub max: Option<Money>,
}

impl BudgetRange {
    pub fn new(min: Option<Money>, max: Option<Money>) -> Self {
        Self { min, max }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// `min <= max` whenever both are present.
    pub fn is_valid(&self) -> bool {
        match (self.min, self.max) {
            (Some(min), Some(max)) => min <= max,
            _ => true,
        }
    }

    /// Whether this budget clears a provider's minimum.
    ///
    /// A lead without `max` satisfies any minimum.
    pub fn satisfies_min_budget(&self, min_budget: Option<Money>) -> bool {
        match (self.max, min_budget) {
            (Some(max), Some(min_budget)) => max >= min_budget,
            _ => true,
        }
    }
}

/// When the consumer wants the work done.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingPreference {
    Asap,
    #[serde(rename = "within_24h")]
    Within24h,
    WithinWeek,
    WithinMonth,
    #[default]
    Flexible,
}

impl TimingPreference {
    /// Urgent timings attract surge pricing.
    pub fn is_urgent(self) -> bool {
        matches!(self, Self::Asap | Self::Within24h)
    }
}

/// Lead lifecycle status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    New,
    Queued,
    Routing,
    Routed,
    Partial,
    Expired,
    Dead,
}

impl LeadStatus {
    /// A worker may claim the lead from this status without a lease check.
    pub fn is_claimable(self) -> bool {
        matches!(self, Self::New | Self::Queued)
    }

    /// Routing has resolved the lead one way or another.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Routed | Self::Partial | Self::Expired | Self::Dead)
    }

    /// Allowed edges of the lead state machine.
    pub fn can_transition_to(self, next: LeadStatus) -> bool {
        use LeadStatus::*;
        matches!(
            (self, next),
            (New, Queued)
                | (New, Routing)
                | (Queued, Routing)
                | (Routing, Routed)
                | (Routing, Partial)
                | (Routing, Dead)
                | (Routing, Queued)
                | (Routed, Queued)
                | (Partial, Queued)
                | (New, Expired)
                | (Queued, Expired)
                | (Routed, Expired)
                | (Partial, Expired)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Queued => "queued",
            Self::Routing => "routing",
            Self::Routed => "routed",
            Self::Partial => "partial",
            Self::Expired => "expired",
            Self::Dead => "dead",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason code attached to a lead that did not route cleanly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingReason {
    /// A live dedupe entry already covers this submission.
    Duplicate,
    /// The lead requested no services.
    NoServices,
    /// `budget_min > budget_max`.
    InvalidBudget,
    /// No coordinates and the postal code could not be resolved.
    MissingLocation,
    /// Nobody passed the eligibility filters.
    NoEligibleProviders,
    /// Transient failures exhausted the retry budget.
    RetriesExhausted,
}

impl RoutingReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::NoServices => "no_services",
            Self::InvalidBudget => "invalid_budget",
            Self::MissingLocation => "missing_location",
            Self::NoEligibleProviders => "no_eligible_providers",
            Self::RetriesExhausted => "retries_exhausted",
        }
    }
}

impl fmt::Display for RoutingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time-limited claim on a lead held by one worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub owner: WorkerId,
    pub expires_at: Timestamp,
}

impl Lease {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

/// A consumer's service need awaiting provider matches.
///
/// INVARIANT: `budget.is_valid()` for any lead that routes.
/// INVARIANT: `status` only moves along [`LeadStatus::can_transition_to`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeadRequest {
    pub id: LeadId,
    pub tenant_id: TenantId,
    pub contact: ConsumerContact,
    pub location: LeadLocation,
    pub service_ids: BTreeSet<ServiceId>,
    pub budget: BudgetRange,
    pub timing: TimingPreference,
    /// Exclusive leads are priced with the exclusive multiplier.
    pub is_exclusive: bool,
    /// Maximum number of concurrent offers.
    pub max_sold_count: u32,
    /// Offers accepted so far.
    pub sold_count: u32,
    pub status: LeadStatus,
    pub status_reason: Option<RoutingReason>,
    pub created_at: Timestamp,
    pub routed_at: Option<Timestamp>,
    /// Claims taken so far, including the current one.
    pub attempts: u32,
    /// Times the lead was sent back for another routing pass.
    pub requeue_count: u32,
    pub lease: Option<Lease>,
}

impl LeadRequest {
    /// Creates a lead in `new` with default capacity and timing.
    pub fn new(
        id: LeadId,
        tenant_id: TenantId,
        contact: ConsumerContact,
        location: LeadLocation,
        service_ids: impl IntoIterator<Item = ServiceId>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            tenant_id,
            contact,
            location,
            service_ids: service_ids.into_iter().collect(),
            budget: BudgetRange::unbounded(),
            timing: TimingPreference::default(),
            is_exclusive: false,
            max_sold_count: DEFAULT_MAX_SOLD_COUNT,
            sold_count: 0,
            status: LeadStatus::New,
            status_reason: None,
            created_at,
            routed_at: None,
            attempts: 0,
            requeue_count: 0,
            lease: None,
        }
    }

    pub fn with_budget(mut self, budget: BudgetRange) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_timing(mut self, timing: TimingPreference) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_max_sold_count(mut self, max_sold_count: u32) -> Self {
        self.max_sold_count = max_sold_count;
        self
    }

    pub fn exclusive(mut self) -> Self {
        self.is_exclusive = true;
        self
    }

    /// Whether a worker may claim the lead at `now`.
    pub fn is_claimable_at(&self, now: Timestamp) -> bool {
        if self.status.is_claimable() {
            return true;
        }
        self.status == LeadStatus::Routing
            && self.lease.as_ref().map_or(true, |lease| lease.is_expired(now))
    }

    /// Whether `owner` currently holds the routing lease.
    pub fn is_leased_by(&self, owner: &WorkerId) -> bool {
        self.status == LeadStatus::Routing
            && self.lease.as_ref().is_some_and(|lease| &lease.owner == owner)
    }

    pub fn is_sold_out(&self) -> bool {
        self.sold_count >= self.max_sold_count
    }
}

/// Terminal outcome written when a worker finishes with a lead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadResolution {
    pub status: LeadStatus,
    pub reason: Option<RoutingReason>,
}

impl LeadResolution {
    pub fn routed() -> Self {
        Self {
            status: LeadStatus::Routed,
            reason: None,
        }
    }

    pub fn partial(reason: RoutingReason) -> Self {
        Self {
            status: LeadStatus::Partial,
            reason: Some(reason),
        }
    }

    pub fn dead() -> Self {
        Self {
            status: LeadStatus::Dead,
            reason: Some(RoutingReason::RetriesExhausted),
        }
    }
}

// =============================================================================
// PROVIDERS
// =============================================================================

/// A provider's offer to perform one service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceOffering {
    pub provider_id: ProviderId,
    pub service_id: ServiceId,
    pub price_min: Option<Money>,
    pub price_max: Option<Money>,
    pub active: bool,
}

/// A circular coverage area.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceArea {
    pub provider_id: ProviderId,
    pub center: GeoPoint,
    pub radius_km: f64,
    pub active: bool,
}

/// Provider-controlled routing preferences.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderPreferences {
    pub min_budget: Option<Money>,
    pub max_radius_km: Option<f64>,
    pub max_leads_per_day: Option<u32>,
    pub max_leads_per_week: Option<u32>,
    /// Skip this provider while its wallet is empty.
    pub pause_when_balance_zero: bool,
    pub notify_email: bool,
    pub notify_sms: bool,
}

impl Default for ProviderPreferences {
    fn default() -> Self {
        Self {
            min_budget: None,
            max_radius_km: None,
            max_leads_per_day: None,
            max_leads_per_week: None,
            pause_when_balance_zero: true,
            notify_email: true,
            notify_sms: false,
        }
    }
}

/// Everything the directory knows about a provider that routing needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub provider_id: ProviderId,
    pub tenant_id: TenantId,
    pub active: bool,
    pub avg_rating: Option<f64>,
    pub offerings: Vec<ServiceOffering>,
    pub areas: Vec<ServiceArea>,
    pub preferences: ProviderPreferences,
}

impl ProviderProfile {
    pub fn new(provider_id: ProviderId, tenant_id: TenantId) -> Self {
        Self {
            provider_id,
            tenant_id,
            active: true,
            avg_rating: None,
            offerings: Vec::new(),
            areas: Vec::new(),
            preferences: ProviderPreferences::default(),
        }
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.avg_rating = Some(rating);
        self
    }

    pub fn offering(mut self, service_id: ServiceId) -> Self {
        self.offerings.push(ServiceOffering {
            provider_id: self.provider_id,
            service_id,
            price_min: None,
            price_max: None,
            active: true,
        });
        self
    }

    pub fn area(mut self, center: GeoPoint, radius_km: f64) -> Self {
        self.areas.push(ServiceArea {
            provider_id: self.provider_id,
            center,
            radius_km,
            active: true,
        });
        self
    }

    pub fn with_preferences(mut self, preferences: ProviderPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    /// True when any active offering covers one of `services`.
    pub fn offers_any(&self, services: &BTreeSet<ServiceId>) -> bool {
        self.offerings
            .iter()
            .any(|o| o.active && services.contains(&o.service_id))
    }
}

/// Tenant pricing rule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricingRule {
    pub id: u64,
    pub tenant_id: TenantId,
    /// `None` matches any service.
    pub service_id: Option<ServiceId>,
    /// `None` matches any postal code.
    pub postal_code: Option<String>,
    /// `None` matches any timing.
    pub timing: Option<TimingPreference>,
    pub base_price: Money,
    pub surge_multiplier: Decimal,
    pub exclusive_multiplier: Decimal,
    pub priority: i32,
    pub active: bool,
}

impl PricingRule {
    pub fn for_service(id: u64, tenant_id: TenantId, service_id: ServiceId, base_price: Money) -> Self {
        Self {
            id,
            tenant_id,
            service_id: Some(service_id),
            postal_code: None,
            timing: None,
            base_price,
            surge_multiplier: Decimal::ONE,
            exclusive_multiplier: Decimal::from(3),
            priority: 0,
            active: true,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

// =============================================================================
// OFFERS
// =============================================================================

/// Offer lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Offered,
    Viewed,
    Accepted,
    Declined,
    Expired,
    Refunded,
}

impl MatchStatus {
    /// Still awaiting the provider's decision.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Offered | Self::Viewed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Offered => "offered",
            Self::Viewed => "viewed",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Expired => "expired",
            Self::Refunded => "refunded",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time-boxed proposal linking one lead to one provider.
///
/// INVARIANT: at most one active match per `(lead_id, provider_id)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub tenant_id: TenantId,
    pub lead_id: LeadId,
    pub provider_id: ProviderId,
    /// Observability only; never used as a filter.
    pub score: f64,
    pub distance_km: f64,
    pub price: Money,
    pub status: MatchStatus,
    pub offered_at: Timestamp,
    pub expires_at: Timestamp,
    pub reminded: bool,
    pub viewed_at: Option<Timestamp>,
    pub decision_at: Option<Timestamp>,
    pub decline_reason: Option<String>,
    /// Ledger sequence number of the acceptance charge.
    pub charge_reference: Option<u64>,
}

impl Match {
    /// Creates a fresh offer expiring `ttl_ms` after `now`.
    pub fn offer(
        lead: &LeadRequest,
        provider_id: ProviderId,
        score: f64,
        distance_km: f64,
        price: Money,
        now: Timestamp,
        ttl_ms: u64,
    ) -> Self {
        Self {
            id: MatchId::new(),
            tenant_id: lead.tenant_id,
            lead_id: lead.id,
            provider_id,
            score,
            distance_km,
            price,
            status: MatchStatus::Offered,
            offered_at: now,
            expires_at: now.saturating_add(ttl_ms),
            reminded: false,
            viewed_at: None,
            decision_at: None,
            decline_reason: None,
            charge_reference: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Active, not yet reminded, and expiring within `(now, now + window_ms]`.
    pub fn reminder_due(&self, now: Timestamp, window_ms: u64) -> bool {
        self.is_active()
            && !self.reminded
            && self.expires_at > now
            && self.expires_at <= now.saturating_add(window_ms)
    }

    /// Applies a status change and stamps the matching timestamp.
    pub fn apply(&mut self, update: &MatchUpdate) {
        self.status = update.status;
        match update.status {
            MatchStatus::Viewed => self.viewed_at = Some(update.at),
            MatchStatus::Offered => {}
            _ => self.decision_at = Some(update.at),
        }
        if update.decline_reason.is_some() {
            self.decline_reason = update.decline_reason.clone();
        }
        if update.charge_reference.is_some() {
            self.charge_reference = update.charge_reference;
        }
    }
}

/// A conditional status change for a single match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchUpdate {
    pub status: MatchStatus,
    pub at: Timestamp,
    pub decline_reason: Option<String>,
    pub charge_reference: Option<u64>,
}

impl MatchUpdate {
    pub fn to(status: MatchStatus, at: Timestamp) -> Self {
        Self {
            status,
            at,
            decline_reason: None,
            charge_reference: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.decline_reason = Some(reason.into());
        self
    }

    pub fn with_charge(mut self, sequence: u64) -> Self {
        self.charge_reference = Some(sequence);
        self
    }
}

// =============================================================================
// ROUTING QUEUE
// =============================================================================

/// Routing work item status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Dead,
}

impl QueueStatus {
    pub fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

/// Transient bookkeeping row for one routing pass of one lead.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingQueueEntry {
    pub id: u64,
    pub tenant_id: TenantId,
    pub lead_id: LeadId,
    pub status: QueueStatus,
    pub enqueued_at: Timestamp,
    pub processed_at: Option<Timestamp>,
    pub attempts: u32,
}

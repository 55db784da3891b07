//! # Value Objects
//!
//! Structured results of a routing pass. Every call to `route` returns one
//! of these so the caller can log or export counts.

use serde::{Deserialize, Serialize};
use shared_types::entities::{LeadId, LeadStatus, MatchId, Money, RoutingReason, TenantId};
use shared_types::errors::ErrorKind;

use super::eligibility::IneligibilityCounts;

/// Counts and decisions from one completed routing pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutingReport {
    pub lead_id: LeadId,
    pub tenant_id: TenantId,
    /// `Routed` or `Partial`.
    pub status: LeadStatus,
    pub reason: Option<RoutingReason>,
    pub matches_created: u32,
    /// Providers returned by the directory.
    pub candidates_considered: u32,
    /// Providers that passed every check, before the capacity cut.
    pub eligible: u32,
    pub exclusions: IneligibilityCounts,
    pub price: Option<Money>,
    pub offers: Vec<MatchId>,
}

impl RoutingReport {
    /// A report for a lead resolved before any provider was looked at.
    pub fn partial(lead_id: LeadId, tenant_id: TenantId, reason: RoutingReason) -> Self {
        Self {
            lead_id,
            tenant_id,
            status: LeadStatus::Partial,
            reason: Some(reason),
            matches_created: 0,
            candidates_considered: 0,
            eligible: 0,
            exclusions: IneligibilityCounts::default(),
            price: None,
            offers: Vec::new(),
        }
    }
}

/// Why a `route` call did nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Another worker holds a live lease.
    Busy,
    /// The lead is already past routing.
    NotClaimable(LeadStatus),
    NotFound,
    /// The lease expired mid-pass and another worker took over.
    LeaseLost,
}

/// Result of one `route` call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RoutingOutcome {
    Completed(RoutingReport),
    /// Lost the claim race or the lead was already handled. A successful no-op.
    Skipped(SkipReason),
    /// A dependency failed; the lead went back to `queued`.
    Retrying {
        attempts: u32,
        error: ErrorKind,
        message: String,
    },
    /// Attempts exhausted; the lead is now `dead`.
    DeadLettered { attempts: u32 },
}

impl RoutingOutcome {
    pub fn matches_created(&self) -> u32 {
        match self {
            Self::Completed(report) => report.matches_created,
            _ => 0,
        }
    }

    /// Status the pass left the lead in, when it decided one.
    pub fn lead_status(&self) -> Option<LeadStatus> {
        match self {
            Self::Completed(report) => Some(report.status),
            Self::Retrying { .. } => Some(LeadStatus::Queued),
            Self::DeadLettered { .. } => Some(LeadStatus::Dead),
            Self::Skipped(_) => None,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    pub fn report(&self) -> Option<&RoutingReport> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }
}

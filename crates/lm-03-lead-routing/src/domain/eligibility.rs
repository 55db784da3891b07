//! # Eligibility
//!
//! Static provider checks that need nothing but the lead and the profile.
//! Checks that need the store or the wallet run in the application service
//! and report through the same [`Ineligibility`] codes.

use serde::{Deserialize, Serialize};
use shared_types::entities::{GeoPoint, LeadRequest, ProviderProfile};
use std::collections::BTreeMap;
use std::fmt;

use super::geo::distance_within;
use super::ranking::Candidate;

/// Why a provider was left out of a routing pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ineligibility {
    Inactive,
    NoMatchingService,
    OutOfArea,
    BelowMinBudget,
    AlreadyOffered,
    DailyCapReached,
    WeeklyCapReached,
    NoWallet,
    InsufficientFunds,
}

impl Ineligibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::NoMatchingService => "no_matching_service",
            Self::OutOfArea => "out_of_area",
            Self::BelowMinBudget => "below_min_budget",
            Self::AlreadyOffered => "already_offered",
            Self::DailyCapReached => "daily_cap_reached",
            Self::WeeklyCapReached => "weekly_cap_reached",
            Self::NoWallet => "no_wallet",
            Self::InsufficientFunds => "insufficient_funds",
        }
    }
}

impl fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exclusion tally for one routing pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IneligibilityCounts(BTreeMap<Ineligibility, u32>);

impl IneligibilityCounts {
    pub fn record(&mut self, reason: Ineligibility) {
        *self.0.entry(reason).or_insert(0) += 1;
    }

    pub fn get(&self, reason: Ineligibility) -> u32 {
        self.0.get(&reason).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Ineligibility, u32)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

/// Smallest distance to any active area covering `point`.
///
/// The effective radius of an area is capped by the provider's
/// `max_radius_km` preference.
pub fn covering_distance(profile: &ProviderProfile, point: GeoPoint) -> Option<f64> {
    let cap = profile.preferences.max_radius_km;
    profile
        .areas
        .iter()
        .filter(|area| area.active)
        .filter_map(|area| {
            let radius = cap.map_or(area.radius_km, |cap| area.radius_km.min(cap));
            distance_within(area.center, radius, point)
        })
        .min_by(f64::total_cmp)
}

/// Runs every check that depends only on the lead and the profile.
///
/// Order matters only for which reason gets reported: cheapest first.
pub fn assess_static(
    profile: &ProviderProfile,
    lead: &LeadRequest,
    point: GeoPoint,
) -> Result<Candidate, Ineligibility> {
    if !profile.active {
        return Err(Ineligibility::Inactive);
    }
    if !profile.offers_any(&lead.service_ids) {
        return Err(Ineligibility::NoMatchingService);
    }
    if !lead
        .budget
        .satisfies_min_budget(profile.preferences.min_budget)
    {
        return Err(Ineligibility::BelowMinBudget);
    }
    let distance_km = covering_distance(profile, point).ok_or(Ineligibility::OutOfArea)?;

    Ok(Candidate {
        provider_id: profile.provider_id,
        distance_km,
        avg_rating: profile.avg_rating,
    })
}

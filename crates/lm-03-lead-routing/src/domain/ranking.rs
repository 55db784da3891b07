//! # Ranking
//!
//! Deterministic ordering of eligible providers:
//! distance ascending, then rating descending, then provider id ascending.

use serde::{Deserialize, Serialize};
use shared_types::entities::ProviderId;
use std::cmp::Ordering;

/// An eligible provider and the facts ranking needs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub provider_id: ProviderId,
    pub distance_km: f64,
    pub avg_rating: Option<f64>,
}

impl Candidate {
    fn rating(&self) -> f64 {
        self.avg_rating.unwrap_or(0.0)
    }

    /// `clamp(100 - 2 * distance_km + 5 * avg_rating, 0, 100)`.
    ///
    /// Observability only; never used to filter.
    pub fn score(&self) -> f64 {
        (100.0 - 2.0 * self.distance_km + 5.0 * self.rating()).clamp(0.0, 100.0)
    }

    /// Total order used for ranking.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        self.distance_km
            .total_cmp(&other.distance_km)
            .then_with(|| other.rating().total_cmp(&self.rating()))
            .then_with(|| self.provider_id.cmp(&other.provider_id))
    }
}

/// Sorts candidates best first.
pub fn rank_candidates(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(Candidate::rank_cmp);
    candidates
}

//! # Lead Routing Configuration

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared_types::entities::{DEFAULT_MAX_SOLD_COUNT, MS_PER_HOUR, MS_PER_MINUTE};

/// Lead routing configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Offer time-to-live.
    pub offer_ttl_ms: u64,

    /// How long a claim stays exclusive before another worker may reclaim it.
    pub lease_ms: u64,

    /// Per-call timeout for directory, wallet, dedupe, and geocoder lookups.
    pub dependency_timeout_ms: u64,

    /// Extra attempts per lookup after the first one times out.
    pub dependency_retries: u32,

    /// Base delay between lookup retries and between lead re-submissions.
    pub retry_backoff_ms: u64,

    /// Upper bound for the exponential backoff.
    pub max_backoff_ms: u64,

    /// Claims allowed before a lead is dead-lettered.
    pub max_attempts: u32,

    /// Price used when no pricing rule matches.
    pub fallback_price: Decimal,

    /// Concurrent offer cap for leads that do not carry their own.
    pub default_max_sold_count: u32,

    /// Number of routing workers.
    pub workers: usize,

    /// Capacity of the routing work channel.
    pub queue_capacity: usize,

    /// Prefix for worker lease identities.
    pub worker_prefix: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            offer_ttl_ms: 72 * MS_PER_HOUR,
            lease_ms: 5 * MS_PER_MINUTE,
            dependency_timeout_ms: 2_000,
            dependency_retries: 2,
            retry_backoff_ms: 200,
            max_backoff_ms: 30_000,
            max_attempts: 5,
            fallback_price: Decimal::new(2500, 2),
            default_max_sold_count: DEFAULT_MAX_SOLD_COUNT,
            workers: 4,
            queue_capacity: 1024,
            worker_prefix: "router".to_string(),
        }
    }
}

impl RoutingConfig {
    /// Create a config for testing (fast timeouts, no real backoff).
    pub fn for_testing() -> Self {
        Self {
            lease_ms: 1_000,
            dependency_timeout_ms: 100,
            dependency_retries: 1,
            retry_backoff_ms: 1,
            max_backoff_ms: 10,
            max_attempts: 3,
            workers: 2,
            queue_capacity: 64,
            ..Self::default()
        }
    }

    /// `retry_backoff_ms * 2^attempt`, capped at `max_backoff_ms`.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        self.retry_backoff_ms
            .saturating_mul(1u64.checked_shl(attempt.min(32)).unwrap_or(u64::MAX))
            .min(self.max_backoff_ms)
    }
}

//! # Dedupe Guard Configuration

use serde::{Deserialize, Serialize};
use shared_types::entities::MS_PER_DAY;

/// Dedupe Guard configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupeConfig {
    /// How long an entry suppresses equivalent submissions.
    pub ttl_ms: u64,

    /// Width of the coarse time bucket folded into the fingerprint.
    pub bucket_ms: u64,
}

impl Default for DedupeConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 30 * MS_PER_DAY,
            bucket_ms: MS_PER_DAY,
        }
    }
}

impl DedupeConfig {
    /// Create a config for testing (one-day TTL).
    pub fn for_testing() -> Self {
        Self {
            ttl_ms: MS_PER_DAY,
            bucket_ms: MS_PER_DAY,
        }
    }
}

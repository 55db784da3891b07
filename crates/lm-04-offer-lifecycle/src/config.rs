//! # Offer Lifecycle Configuration

use serde::{Deserialize, Serialize};
use shared_types::entities::{MS_PER_DAY, MS_PER_HOUR};

use crate::domain::ExpiryPolicy;

/// Offer lifecycle configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Offers expiring within this window get one reminder.
    pub reminder_window_ms: u64,

    /// Completed routing queue rows older than this are purged.
    pub queue_retention_ms: u64,

    /// Dedupe log entries older than this are purged.
    pub dedupe_retention_ms: u64,

    /// What happens to a lead once all its offers are gone.
    pub expiry_policy: ExpiryPolicy,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            reminder_window_ms: 2 * MS_PER_HOUR,
            queue_retention_ms: 7 * MS_PER_DAY,
            dedupe_retention_ms: 30 * MS_PER_DAY,
            expiry_policy: ExpiryPolicy::NoFollowUp,
        }
    }
}

impl LifecycleConfig {
    /// Create a config for testing.
    pub fn for_testing() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: ExpiryPolicy) -> Self {
        self.expiry_policy = policy;
        self
    }
}

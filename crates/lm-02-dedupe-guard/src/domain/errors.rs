//! # Domain Errors

use shared_types::errors::ErrorKind;
use thiserror::Error;

/// Dedupe Guard error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DedupeError {
    /// The dedupe log could not be reached. Retryable.
    #[error("Dedupe log unavailable: {0}")]
    Unavailable(String),

    /// Another lead owns the entry being confirmed or released.
    #[error("Fingerprint {fingerprint} is owned by lead {owner}")]
    NotOwner { fingerprint: String, owner: u64 },
}

impl DedupeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable(_) => ErrorKind::TransientDependency,
            Self::NotOwner { .. } => ErrorKind::Conflict,
        }
    }
}

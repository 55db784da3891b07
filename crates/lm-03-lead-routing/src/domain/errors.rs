//! # Domain Errors
//!
//! Callers branch on [`RoutingError::kind`], never on message text.

use rust_decimal::Decimal;
use shared_types::entities::RoutingReason;
use shared_types::errors::{ErrorKind, StoreError};
use thiserror::Error;

use crate::ports::outbound::Dependency;

/// Lead failed a precondition. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Lead requests no services")]
    EmptyServiceSet,

    #[error("Invalid budget: min {min} exceeds max {max}")]
    InvalidBudget { min: Decimal, max: Decimal },

    /// No usable coordinates and the postal code could not be resolved.
    #[error("Lead location could not be resolved")]
    MissingLocation,
}

impl ValidationError {
    /// Reason code recorded on the lead.
    pub fn reason(&self) -> RoutingReason {
        match self {
            Self::EmptyServiceSet => RoutingReason::NoServices,
            Self::InvalidBudget { .. } => RoutingReason::InvalidBudget,
            Self::MissingLocation => RoutingReason::MissingLocation,
        }
    }
}

/// Lead routing error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A lookup timed out or its backend was unreachable after all retries.
    #[error("{dependency} unavailable: {message}")]
    TransientDependency {
        dependency: Dependency,
        message: String,
    },

    #[error("Concurrency conflict: {0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RoutingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::TransientDependency { .. } => ErrorKind::TransientDependency,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Store(e) => e.kind(),
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the lead should go back to the queue for another attempt.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::TransientDependency
    }
}

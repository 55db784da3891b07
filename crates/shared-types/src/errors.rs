//! # Error Types
//!
//! Store errors shared by every repository port, plus the coarse error
//! classification used when aggregating failures across a batch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Errors returned by repository ports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backing store could not be reached. Retryable.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The referenced row does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness or conditional-write guard rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Anything else.
    #[error("Store internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Whether the caller may retry the operation unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable(_) => ErrorKind::TransientDependency,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Internal(_) => ErrorKind::Store,
        }
    }
}

/// Error taxonomy shared by all subsystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input failed a precondition. Never retried.
    Validation,
    /// A dependency was slow or unreachable. Retried with backoff.
    TransientDependency,
    /// A concurrent writer got there first.
    Conflict,
    InsufficientFunds,
    NotFound,
    Store,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::TransientDependency => "transient_dependency",
            Self::Conflict => "conflict",
            Self::InsufficientFunds => "insufficient_funds",
            Self::NotFound => "not_found",
            Self::Store => "store",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-kind failure tally for batch jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCounts(BTreeMap<ErrorKind, u64>);

impl ErrorCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: ErrorKind) {
        *self.0.entry(kind).or_insert(0) += 1;
    }

    pub fn get(&self, kind: ErrorKind) -> u64 {
        self.0.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn merge(&mut self, other: &ErrorCounts) {
        for (kind, count) in &other.0 {
            *self.0.entry(*kind).or_insert(0) += count;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ErrorKind, u64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

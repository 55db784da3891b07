//! # Domain Errors

use rust_decimal::Decimal;
use shared_types::entities::{LeadId, MatchId, MatchStatus, ProviderId};
use shared_types::errors::{ErrorKind, StoreError};
use thiserror::Error;

use crate::ports::outbound::GatewayError;

/// Offer lifecycle error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("Offer not found: {0}")]
    OfferNotFound(MatchId),

    #[error("Lead not found: {0}")]
    LeadNotFound(LeadId),

    /// The caller is not the provider the offer was made to.
    #[error("Offer {match_id} does not belong to provider {provider_id}")]
    NotOwner {
        match_id: MatchId,
        provider_id: ProviderId,
    },

    /// The offer is not in a status the operation accepts.
    #[error("Offer {match_id} is {status}")]
    InvalidTransition {
        match_id: MatchId,
        status: MatchStatus,
    },

    /// The offer passed `expires_at` before the provider acted.
    #[error("Offer {0} has expired")]
    OfferExpired(MatchId),

    /// The lead already reached `max_sold_count`.
    #[error("Lead {0} is sold out")]
    SoldOut(LeadId),

    #[error("Insufficient funds for provider {provider_id}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        provider_id: ProviderId,
        balance: Decimal,
        requested: Decimal,
    },

    #[error("Ledger error: {0}")]
    Ledger(GatewayError),

    #[error("Dedupe log error: {0}")]
    DedupeLog(GatewayError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OfferNotFound(_) | Self::LeadNotFound(_) => ErrorKind::NotFound,
            Self::NotOwner { .. } => ErrorKind::Validation,
            Self::InvalidTransition { .. } | Self::OfferExpired(_) | Self::SoldOut(_) => {
                ErrorKind::Conflict
            }
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::Ledger(e) | Self::DedupeLog(e) => e.kind(),
            Self::Store(e) => e.kind(),
        }
    }
}

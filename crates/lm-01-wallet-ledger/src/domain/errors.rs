//! # Domain Errors

use shared_types::entities::{Money, ProviderId};
use shared_types::errors::ErrorKind;
use thiserror::Error;

/// Wallet Ledger error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// The debit would take the balance below zero.
    #[error("Insufficient funds for provider {provider_id}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        provider_id: ProviderId,
        balance: Money,
        requested: Money,
    },

    /// Amounts must be strictly positive and within the configured limit.
    #[error("Invalid amount: {0}")]
    InvalidAmount(Money),

    #[error("Wallet not found for provider {0}")]
    WalletNotFound(ProviderId),

    /// The payment reference was already credited.
    #[error("Duplicate payment reference: {0}")]
    DuplicatePayment(String),

    /// A refund targets a sequence that is not a completed charge.
    #[error("Transaction {sequence} cannot be refunded: {reason}")]
    NotRefundable { sequence: u64, reason: &'static str },

    /// Stored history violates a ledger invariant.
    #[error("Ledger chain broken for provider {provider_id} at sequence {sequence}")]
    ChainBroken { provider_id: ProviderId, sequence: u64 },
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::InvalidAmount(_) => ErrorKind::Validation,
            Self::WalletNotFound(_) => ErrorKind::NotFound,
            Self::DuplicatePayment(_) | Self::NotRefundable { .. } => ErrorKind::Conflict,
            Self::ChainBroken { .. } => ErrorKind::Internal,
        }
    }
}

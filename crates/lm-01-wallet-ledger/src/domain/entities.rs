//! # Wallet Entities

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared_types::entities::{Money, ProviderId, Timestamp};
use std::fmt;

/// What a ledger entry represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Prepaid credits bought by the provider.
    Purchase,
    /// Payment for an accepted offer.
    Charge,
    /// A charge given back.
    Refund,
    /// Manual correction in either direction.
    Adjustment,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Charge => "charge",
            Self::Refund => "refund",
            Self::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settlement status of a ledger entry.
///
/// Amounts are immutable once appended; only a charge's status may move to
/// `Reversed` when a refund entry offsets it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Completed,
    Reversed,
}

/// One entry of a provider's append-only ledger.
///
/// INVARIANT: `balance_after == balance_before + amount`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransaction {
    /// Position in the provider's chain, starting at 1.
    pub sequence: u64,
    pub provider_id: ProviderId,
    pub kind: TransactionKind,
    /// Signed: credits positive, debits negative.
    pub amount: Money,
    pub balance_before: Money,
    pub balance_after: Money,
    pub status: TransactionStatus,
    pub reason: String,
    /// External payment reference for purchases.
    pub reference: Option<String>,
    /// For refunds, the sequence of the charge being offset.
    pub reverses: Option<u64>,
    pub created_at: Timestamp,
}

impl WalletTransaction {
    pub fn is_credit(&self) -> bool {
        self.amount > Decimal::ZERO
    }
}

/// A provider's prepaid balance plus lifetime counters.
///
/// INVARIANT: `balance >= 0`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub provider_id: ProviderId,
    pub balance: Money,
    pub lifetime_purchased: Money,
    pub lifetime_spent: Money,
    pub lifetime_refunded: Money,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Wallet {
    pub fn open(provider_id: ProviderId, now: Timestamp) -> Self {
        Self {
            provider_id,
            balance: Decimal::ZERO,
            lifetime_purchased: Decimal::ZERO,
            lifetime_spent: Decimal::ZERO,
            lifetime_refunded: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Strictly positive balance.
    pub fn is_funded(&self) -> bool {
        self.balance > Decimal::ZERO
    }
}

//! # Provider Ledger
//!
//! Pure, synchronous state machine for one provider's wallet. Each method
//! validates, appends exactly one entry, and updates the balance, or changes
//! nothing at all.

use super::entities::{TransactionKind, TransactionStatus, Wallet, WalletTransaction};
use super::errors::WalletError;
use super::invariants::{invariant_chain_contiguous, invariant_entry_balanced};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared_types::entities::{Money, ProviderId, Timestamp};
use std::collections::HashSet;

/// A wallet plus its full transaction history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderLedger {
    wallet: Wallet,
    entries: Vec<WalletTransaction>,
    references: HashSet<String>,
}

impl ProviderLedger {
    pub fn open(provider_id: ProviderId, now: Timestamp) -> Self {
        Self {
            wallet: Wallet::open(provider_id, now),
            entries: Vec::new(),
            references: HashSet::new(),
        }
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn entries(&self) -> &[WalletTransaction] {
        &self.entries
    }

    pub fn balance(&self) -> Money {
        self.wallet.balance
    }

    /// Credits purchased funds. A `reference` may be credited only once.
    pub fn purchase(
        &mut self,
        amount: Money,
        reference: Option<String>,
        now: Timestamp,
    ) -> Result<WalletTransaction, WalletError> {
        ensure_positive(amount)?;
        if let Some(reference) = &reference {
            if self.references.contains(reference) {
                return Err(WalletError::DuplicatePayment(reference.clone()));
            }
        }

        let entry = self.append(
            TransactionKind::Purchase,
            amount,
            "credit purchase".to_string(),
            reference.clone(),
            None,
            now,
        );
        if let Some(reference) = reference {
            self.references.insert(reference);
        }
        self.wallet.lifetime_purchased += amount;
        Ok(entry)
    }

    /// Debits `amount`. Fails without side effects if the balance would go
    /// negative.
    pub fn debit(
        &mut self,
        kind: TransactionKind,
        amount: Money,
        reason: String,
        now: Timestamp,
    ) -> Result<WalletTransaction, WalletError> {
        ensure_positive(amount)?;
        if self.wallet.balance < amount {
            return Err(WalletError::InsufficientFunds {
                provider_id: self.wallet.provider_id,
                balance: self.wallet.balance,
                requested: amount,
            });
        }

        let entry = self.append(kind, -amount, reason, None, None, now);
        if kind == TransactionKind::Charge {
            self.wallet.lifetime_spent += amount;
        }
        Ok(entry)
    }

    /// Credits `amount` as a manual adjustment.
    pub fn credit(
        &mut self,
        amount: Money,
        reason: String,
        now: Timestamp,
    ) -> Result<WalletTransaction, WalletError> {
        ensure_positive(amount)?;
        Ok(self.append(TransactionKind::Adjustment, amount, reason, None, None, now))
    }

    /// Offsets a completed charge with a refund entry and marks it reversed.
    pub fn refund(
        &mut self,
        charge_sequence: u64,
        reason: String,
        now: Timestamp,
    ) -> Result<WalletTransaction, WalletError> {
        let index = charge_sequence
            .checked_sub(1)
            .map(|i| i as usize)
            .filter(|i| *i < self.entries.len())
            .ok_or(WalletError::NotRefundable {
                sequence: charge_sequence,
                reason: "no such transaction",
            })?;

        let charge = &self.entries[index];
        if charge.kind != TransactionKind::Charge {
            return Err(WalletError::NotRefundable {
                sequence: charge_sequence,
                reason: "not a charge",
            });
        }
        if charge.status == TransactionStatus::Reversed {
            return Err(WalletError::NotRefundable {
                sequence: charge_sequence,
                reason: "already refunded",
            });
        }

        let amount = -charge.amount;
        self.entries[index].status = TransactionStatus::Reversed;
        let entry = self.append(
            TransactionKind::Refund,
            amount,
            reason,
            None,
            Some(charge_sequence),
            now,
        );
        self.wallet.lifetime_refunded += amount;
        Ok(entry)
    }

    /// Re-checks every ledger invariant over the stored history and confirms
    /// the wallet balance equals the chain head.
    pub fn verify_chain(&self) -> Result<(), WalletError> {
        invariant_chain_contiguous(&self.entries)?;
        let head = self
            .entries
            .last()
            .map_or(Decimal::ZERO, |entry| entry.balance_after);
        if head != self.wallet.balance {
            return Err(WalletError::ChainBroken {
                provider_id: self.wallet.provider_id,
                sequence: self.entries.len() as u64,
            });
        }
        Ok(())
    }

    fn append(
        &mut self,
        kind: TransactionKind,
        amount: Money,
        reason: String,
        reference: Option<String>,
        reverses: Option<u64>,
        now: Timestamp,
    ) -> WalletTransaction {
        let balance_before = self.wallet.balance;
        let entry = WalletTransaction {
            sequence: self.entries.len() as u64 + 1,
            provider_id: self.wallet.provider_id,
            kind,
            amount,
            balance_before,
            balance_after: balance_before + amount,
            status: TransactionStatus::Completed,
            reason,
            reference,
            reverses,
            created_at: now,
        };
        debug_assert!(invariant_entry_balanced(&entry));

        self.wallet.balance = entry.balance_after;
        self.wallet.updated_at = now;
        self.entries.push(entry.clone());
        entry
    }
}

fn ensure_positive(amount: Money) -> Result<(), WalletError> {
    if amount <= Decimal::ZERO {
        return Err(WalletError::InvalidAmount(amount));
    }
    Ok(())
}

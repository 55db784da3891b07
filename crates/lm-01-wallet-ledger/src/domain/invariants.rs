//! # Domain Invariants
//!
//! Ledger rules that must hold for every provider's history.

use super::entities::WalletTransaction;
use super::errors::WalletError;
use rust_decimal::Decimal;

/// Invariant: `balance_after == balance_before + amount`.
pub fn invariant_entry_balanced(entry: &WalletTransaction) -> bool {
    entry.balance_before + entry.amount == entry.balance_after
}

/// Invariant: every entry is balanced, `balance_before[i+1] == balance_after[i]`,
/// sequences are contiguous from 1, and no balance is negative.
pub fn invariant_chain_contiguous(entries: &[WalletTransaction]) -> Result<(), WalletError> {
    let mut previous: Option<&WalletTransaction> = None;

    for (index, entry) in entries.iter().enumerate() {
        let broken = WalletError::ChainBroken {
            provider_id: entry.provider_id,
            sequence: entry.sequence,
        };

        if entry.sequence != index as u64 + 1
            || !invariant_entry_balanced(entry)
            || entry.balance_after < Decimal::ZERO
        {
            return Err(broken);
        }

        match previous {
            Some(prev) if prev.balance_after != entry.balance_before => return Err(broken),
            None if !entry.balance_before.is_zero() => return Err(broken),
            _ => {}
        }
        previous = Some(entry);
    }

    Ok(())
}

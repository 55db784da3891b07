//! # Inbound Ports
//!
//! API trait defining what the Wallet Ledger can do.

use crate::domain::{Wallet, WalletError, WalletTransaction};
use async_trait::async_trait;
use shared_types::entities::{Money, ProviderId};

/// Wallet Ledger API - inbound port.
///
/// Every mutating call appends exactly one [`WalletTransaction`] and updates
/// the balance as a single atomic unit.
#[async_trait]
pub trait WalletApi: Send + Sync {
    /// Current balance. Fails with `WalletNotFound` for unknown providers.
    async fn get_balance(&self, provider_id: ProviderId) -> Result<Money, WalletError>;

    async fn wallet(&self, provider_id: ProviderId) -> Result<Wallet, WalletError>;

    /// Opens an empty wallet. Idempotent.
    async fn open_wallet(&self, provider_id: ProviderId) -> Result<Wallet, WalletError>;

    /// Charges `amount`. Fails with `InsufficientFunds` if the balance would
    /// go negative.
    async fn debit(
        &self,
        provider_id: ProviderId,
        amount: Money,
        reason: &str,
    ) -> Result<WalletTransaction, WalletError>;

    /// Adds `amount` as an adjustment. Opens the wallet if needed.
    async fn credit(
        &self,
        provider_id: ProviderId,
        amount: Money,
        reason: &str,
    ) -> Result<WalletTransaction, WalletError>;

    /// Credits purchased funds. Re-using `payment_reference` fails with
    /// `DuplicatePayment`. Opens the wallet if needed.
    async fn purchase(
        &self,
        provider_id: ProviderId,
        amount: Money,
        payment_reference: Option<&str>,
    ) -> Result<WalletTransaction, WalletError>;

    /// Gives back a previous charge identified by its ledger sequence.
    async fn refund(
        &self,
        provider_id: ProviderId,
        charge_sequence: u64,
        reason: &str,
    ) -> Result<WalletTransaction, WalletError>;

    /// Most recent entries first, at most one page.
    async fn transactions(
        &self,
        provider_id: ProviderId,
    ) -> Result<Vec<WalletTransaction>, WalletError>;

    /// Re-checks the stored chain against the ledger invariants.
    async fn verify_chain(&self, provider_id: ProviderId) -> Result<(), WalletError>;
}

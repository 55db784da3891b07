//! # Outbound Ports
//!
//! What the offer lifecycle needs from the wallet ledger, the dedupe log,
//! and the repositories.

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared_types::entities::{ProviderId, Timestamp};
use shared_types::errors::ErrorKind;
use shared_types::ports::{LeadRepository, MatchRepository, RoutingQueueRepository};
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by a ledger or dedupe-log adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },

    /// The backend refused the request. Not retryable.
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::Rejected(_) => ErrorKind::Conflict,
            Self::Unavailable(_) => ErrorKind::TransientDependency,
        }
    }
}

/// Charges and refunds against a provider's wallet.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Debits `amount`. Returns the ledger sequence of the charge.
    async fn charge(
        &self,
        provider_id: ProviderId,
        amount: Decimal,
        reason: &str,
    ) -> Result<u64, GatewayError>;

    /// Offsets the charge at `charge_sequence`. Returns the refund's sequence.
    async fn refund(
        &self,
        provider_id: ProviderId,
        charge_sequence: u64,
        reason: &str,
    ) -> Result<u64, GatewayError>;
}

/// Retention for the dedupe log.
#[async_trait]
pub trait DedupeLogCleaner: Send + Sync {
    /// Deletes entries created before `cutoff` and returns how many.
    async fn purge_before(&self, cutoff: Timestamp) -> Result<u64, GatewayError>;
}

/// Repositories the lifecycle reads and writes.
#[derive(Clone)]
pub struct LifecycleStores {
    pub leads: Arc<dyn LeadRepository>,
    pub matches: Arc<dyn MatchRepository>,
    pub queue: Arc<dyn RoutingQueueRepository>,
}

impl LifecycleStores {
    /// Uses one store for all three repositories.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: LeadRepository + MatchRepository + RoutingQueueRepository + 'static,
    {
        Self {
            leads: store.clone(),
            matches: store.clone(),
            queue: store,
        }
    }
}

// =============================================================================
// TEST DOUBLES
// =============================================================================

#[cfg(test)]
pub use mocks::*;

#[cfg(test)]
mod mocks {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    /// Balance-only ledger. Sequences are shared across providers.
    #[derive(Default)]
    pub struct MockLedger {
        pub balances: Mutex<HashMap<ProviderId, Decimal>>,
        /// Charges by sequence: `(provider, amount, refunded)`.
        pub charges: Mutex<HashMap<u64, (ProviderId, Decimal, bool)>>,
        pub next_sequence: AtomicU64,
        pub offline: AtomicBool,
    }

    impl MockLedger {
        pub fn with_balances(balances: &[(ProviderId, Decimal)]) -> Self {
            Self {
                balances: Mutex::new(balances.iter().copied().collect()),
                ..Default::default()
            }
        }

        pub fn balance(&self, provider_id: ProviderId) -> Decimal {
            self.balances
                .lock()
                .get(&provider_id)
                .copied()
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl LedgerGateway for MockLedger {
        async fn charge(
            &self,
            provider_id: ProviderId,
            amount: Decimal,
            _reason: &str,
        ) -> Result<u64, GatewayError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(GatewayError::Unavailable("ledger offline".into()));
            }
            let mut balances = self.balances.lock();
            let balance = balances.entry(provider_id).or_default();
            if *balance < amount {
                return Err(GatewayError::InsufficientFunds {
                    balance: *balance,
                    requested: amount,
                });
            }
            *balance -= amount;
            let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1;
            self.charges
                .lock()
                .insert(sequence, (provider_id, amount, false));
            Ok(sequence)
        }

        async fn refund(
            &self,
            provider_id: ProviderId,
            charge_sequence: u64,
            _reason: &str,
        ) -> Result<u64, GatewayError> {
            let amount = {
                let mut charges = self.charges.lock();
                let Some((owner, amount, refunded)) = charges.get_mut(&charge_sequence) else {
                    return Err(GatewayError::Rejected("unknown charge".into()));
                };
                if *owner != provider_id || *refunded {
                    return Err(GatewayError::Rejected("not refundable".into()));
                }
                *refunded = true;
                *amount
            };
            *self.balances.lock().entry(provider_id).or_default() += amount;
            Ok(self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    #[derive(Default)]
    pub struct MockDedupeLog {
        pub entries: Mutex<Vec<Timestamp>>,
        pub offline: AtomicBool,
    }

    #[async_trait]
    impl DedupeLogCleaner for MockDedupeLog {
        async fn purge_before(&self, cutoff: Timestamp) -> Result<u64, GatewayError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(GatewayError::Unavailable("dedupe log offline".into()));
            }
            let mut entries = self.entries.lock();
            let before = entries.len();
            entries.retain(|created| *created >= cutoff);
            Ok((before - entries.len()) as u64)
        }
    }
}

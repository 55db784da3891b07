//! # Wallet Ledger Adapter
//!
//! Routing only reads balances; the offer desk charges and refunds.

use async_trait::async_trait;
use lm_01_wallet_ledger::{WalletApi, WalletError};
use lm_03_lead_routing::{DependencyError, WalletGateway};
use lm_04_offer_lifecycle::{GatewayError, LedgerGateway};
use shared_types::entities::{Money, ProviderId};
use shared_types::errors::ErrorKind;
use std::sync::Arc;

pub struct WalletLedgerAdapter {
    ledger: Arc<dyn WalletApi>,
}

impl WalletLedgerAdapter {
    pub fn new(ledger: Arc<dyn WalletApi>) -> Self {
        Self { ledger }
    }
}

fn gateway_error(err: WalletError) -> GatewayError {
    match err {
        WalletError::InsufficientFunds {
            balance, requested, ..
        } => GatewayError::InsufficientFunds { balance, requested },
        other if other.kind() == ErrorKind::TransientDependency => {
            GatewayError::Unavailable(other.to_string())
        }
        other => GatewayError::Rejected(other.to_string()),
    }
}

#[async_trait]
impl WalletGateway for WalletLedgerAdapter {
    async fn balance(&self, provider_id: ProviderId) -> Result<Option<Money>, DependencyError> {
        match self.ledger.get_balance(provider_id).await {
            Ok(balance) => Ok(Some(balance)),
            Err(WalletError::WalletNotFound(_)) => Ok(None),
            Err(e) => Err(DependencyError::Rejected(e.to_string())),
        }
    }
}

#[async_trait]
impl LedgerGateway for WalletLedgerAdapter {
    async fn charge(
        &self,
        provider_id: ProviderId,
        amount: Money,
        reason: &str,
    ) -> Result<u64, GatewayError> {
        self.ledger
            .debit(provider_id, amount, reason)
            .await
            .map(|tx| tx.sequence)
            .map_err(gateway_error)
    }

    async fn refund(
        &self,
        provider_id: ProviderId,
        charge_sequence: u64,
        reason: &str,
    ) -> Result<u64, GatewayError> {
        self.ledger
            .refund(provider_id, charge_sequence, reason)
            .await
            .map(|tx| tx.sequence)
            .map_err(gateway_error)
    }
}

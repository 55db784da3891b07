//! # Wallet Ledger Service
//!
//! Holds one [`ProviderLedger`] per provider behind its own mutex. A
//! mutation locks only that provider's ledger, so unrelated wallets never
//! contend and two debits on the same wallet can never interleave.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use shared_types::entities::{Money, ProviderId};
use shared_types::time::TimeSource;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::WalletConfig;
use crate::domain::{ProviderLedger, TransactionKind, Wallet, WalletError, WalletTransaction};
use crate::ports::WalletApi;

/// Wallet Ledger Service - in-process implementation of [`WalletApi`].
pub struct WalletLedgerService {
    config: WalletConfig,
    ledgers: RwLock<HashMap<ProviderId, Arc<Mutex<ProviderLedger>>>>,
    time_source: Arc<dyn TimeSource>,
}

impl WalletLedgerService {
    pub fn new(config: WalletConfig, time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            config,
            ledgers: RwLock::new(HashMap::new()),
            time_source,
        }
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// Number of wallets opened so far.
    pub fn wallet_count(&self) -> usize {
        self.ledgers.read().len()
    }

    fn ledger(&self, provider_id: ProviderId) -> Result<Arc<Mutex<ProviderLedger>>, WalletError> {
        self.ledgers
            .read()
            .get(&provider_id)
            .cloned()
            .ok_or(WalletError::WalletNotFound(provider_id))
    }

    fn ledger_or_open(&self, provider_id: ProviderId) -> Arc<Mutex<ProviderLedger>> {
        if let Some(ledger) = self.ledgers.read().get(&provider_id) {
            return ledger.clone();
        }
        let now = self.time_source.now();
        self.ledgers
            .write()
            .entry(provider_id)
            .or_insert_with(|| {
                debug!(provider_id = %provider_id, "Opening wallet");
                Arc::new(Mutex::new(ProviderLedger::open(provider_id, now)))
            })
            .clone()
    }

    fn check_limit(&self, amount: Money) -> Result<(), WalletError> {
        if amount <= Decimal::ZERO || !self.config.within_limit(amount) {
            return Err(WalletError::InvalidAmount(amount));
        }
        Ok(())
    }
}

#[async_trait]
impl WalletApi for WalletLedgerService {
    async fn get_balance(&self, provider_id: ProviderId) -> Result<Money, WalletError> {
        Ok(self.ledger(provider_id)?.lock().balance())
    }

    async fn wallet(&self, provider_id: ProviderId) -> Result<Wallet, WalletError> {
        Ok(self.ledger(provider_id)?.lock().wallet().clone())
    }

    async fn open_wallet(&self, provider_id: ProviderId) -> Result<Wallet, WalletError> {
        Ok(self.ledger_or_open(provider_id).lock().wallet().clone())
    }

    async fn debit(
        &self,
        provider_id: ProviderId,
        amount: Money,
        reason: &str,
    ) -> Result<WalletTransaction, WalletError> {
        self.check_limit(amount)?;
        let ledger = self.ledger(provider_id)?;
        let now = self.time_source.now();

        let result = ledger
            .lock()
            .debit(TransactionKind::Charge, amount, reason.to_string(), now);

        match &result {
            Ok(entry) => info!(
                provider_id = %provider_id,
                amount = %amount,
                balance = %entry.balance_after,
                sequence = entry.sequence,
                "Wallet debited"
            ),
            Err(e) => warn!(provider_id = %provider_id, amount = %amount, error = %e, "Debit rejected"),
        }
        result
    }

    async fn credit(
        &self,
        provider_id: ProviderId,
        amount: Money,
        reason: &str,
    ) -> Result<WalletTransaction, WalletError> {
        self.check_limit(amount)?;
        let now = self.time_source.now();
        let entry = self
            .ledger_or_open(provider_id)
            .lock()
            .credit(amount, reason.to_string(), now)?;

        info!(
            provider_id = %provider_id,
            amount = %amount,
            balance = %entry.balance_after,
            "Wallet credited"
        );
        Ok(entry)
    }

    async fn purchase(
        &self,
        provider_id: ProviderId,
        amount: Money,
        payment_reference: Option<&str>,
    ) -> Result<WalletTransaction, WalletError> {
        self.check_limit(amount)?;
        let now = self.time_source.now();
        let entry = self.ledger_or_open(provider_id).lock().purchase(
            amount,
            payment_reference.map(str::to_owned),
            now,
        )?;

        info!(
            provider_id = %provider_id,
            amount = %amount,
            reference = ?payment_reference,
            "Credits purchased"
        );
        Ok(entry)
    }

    async fn refund(
        &self,
        provider_id: ProviderId,
        charge_sequence: u64,
        reason: &str,
    ) -> Result<WalletTransaction, WalletError> {
        let ledger = self.ledger(provider_id)?;
        let now = self.time_source.now();
        let entry = ledger
            .lock()
            .refund(charge_sequence, reason.to_string(), now)?;

        info!(
            provider_id = %provider_id,
            charge_sequence,
            amount = %entry.amount,
            "Charge refunded"
        );
        Ok(entry)
    }

    async fn transactions(
        &self,
        provider_id: ProviderId,
    ) -> Result<Vec<WalletTransaction>, WalletError> {
        let ledger = self.ledger(provider_id)?;
        let guard = ledger.lock();
        Ok(guard
            .entries()
            .iter()
            .rev()
            .take(self.config.history_page_size)
            .cloned()
            .collect())
    }

    async fn verify_chain(&self, provider_id: ProviderId) -> Result<(), WalletError> {
        self.ledger(provider_id)?.lock().verify_chain()
    }
}

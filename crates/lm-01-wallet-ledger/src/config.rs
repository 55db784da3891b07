//! # Wallet Ledger Configuration

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Wallet Ledger configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// ISO currency code balances are denominated in.
    pub currency: String,

    /// Largest single credit or debit accepted. `None` disables the cap.
    pub max_transaction_amount: Option<Decimal>,

    /// Maximum entries returned by one history query.
    pub history_page_size: usize,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            max_transaction_amount: Some(Decimal::from(100_000)),
            history_page_size: 500,
        }
    }
}

impl WalletConfig {
    /// Create a config for testing (no amount cap, small pages).
    pub fn for_testing() -> Self {
        Self {
            currency: "USD".to_string(),
            max_transaction_amount: None,
            history_page_size: 50,
        }
    }

    /// Whether `amount` is within the configured cap.
    pub fn within_limit(&self, amount: Decimal) -> bool {
        self.max_transaction_amount.map_or(true, |max| amount <= max)
    }
}

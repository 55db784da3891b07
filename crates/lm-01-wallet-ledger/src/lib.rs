//! # LM-01 Wallet Ledger
//!
//! Per-provider prepaid balance backed by an append-only transaction chain.
//!
//! **Subsystem ID:** 1  
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Ledger Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | Balance never negative | `debit` fails with `InsufficientFunds` |
//! | `balance_after = balance_before + amount` | Checked on every append |
//! | Contiguous chain | `balance_before[i+1] = balance_after[i]` |
//! | One credit per payment reference | `DuplicatePayment` |
//!
//! Every mutation (append + balance update) runs under the provider's ledger
//! lock, so concurrent debits against the same wallet serialize.
//!
//! ## Module Structure
//!
//! ```text
//! lm-01-wallet-ledger/
//! ├── domain/          # Wallet, WalletTransaction, ProviderLedger, invariants
//! ├── ports/           # WalletApi (inbound)
//! ├── application/     # WalletLedgerService
//! └── config.rs        # WalletConfig
//! ```

#![warn(clippy::all)]

pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::WalletLedgerService;
pub use config::WalletConfig;
pub use domain::{
    invariant_chain_contiguous, invariant_entry_balanced, ProviderLedger, TransactionKind,
    TransactionStatus, Wallet, WalletError, WalletTransaction,
};
pub use ports::WalletApi;

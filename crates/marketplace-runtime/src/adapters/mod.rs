//! # Adapter Implementations
//!
//! Outbound ports of the routing engine and the offer lifecycle, implemented
//! over the in-process subsystems.
//!
//! | Adapter | Implements | Backed by |
//! |---------|------------|-----------|
//! | [`WalletLedgerAdapter`] | `WalletGateway`, `LedgerGateway` | `WalletLedgerService` |
//! | [`DedupeGuardAdapter`] | `DedupeGate`, `DedupeLogCleaner` | `DedupeGuardService` |
//! | [`CatalogDirectory`] | `ProviderDirectory`, `Geocoder` | `InMemoryProviderCatalog` |

pub mod catalog;
pub mod dedupe;
pub mod wallet;

pub use catalog::CatalogDirectory;
pub use dedupe::DedupeGuardAdapter;
pub use wallet::WalletLedgerAdapter;

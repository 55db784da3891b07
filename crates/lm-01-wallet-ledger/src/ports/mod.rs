//! # Ports Module
//!
//! The Wallet Ledger has no outbound dependencies beyond the clock.

pub mod inbound;

pub use inbound::*;

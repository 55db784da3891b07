//! # Domain Module
//!
//! Wallet entities, the pure ledger state machine, and its invariants.

pub mod entities;
pub mod errors;
pub mod invariants;
pub mod ledger;

pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use ledger::*;

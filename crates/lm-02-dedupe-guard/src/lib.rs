//! # LM-02 Dedupe Guard
//!
//! Suppresses re-processing of effectively identical lead submissions.
//!
//! **Subsystem ID:** 2  
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Fingerprint
//!
//! ```text
//! sha256( tenant_id | normalized contact | sorted service ids | time bucket )
//! ```
//!
//! | Component | Normalization |
//! |-----------|---------------|
//! | email | trimmed, lowercased |
//! | phone | digits only |
//! | name | only when email and phone are both absent |
//! | services | ascending, comma-joined |
//! | bucket | `created_at / bucket_ms` (daily by default) |
//!
//! ## Check-and-Reserve
//!
//! `check` atomically inserts an unconfirmed reservation when no live entry
//! exists, so two concurrent submissions with the same fingerprint cannot
//! both pass. A routing pass that creates no offers releases its
//! reservation; one that does create offers confirms it with `record`.

#![warn(clippy::all)]

pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::DedupeGuardService;
pub use config::DedupeConfig;
pub use domain::{DedupeDecision, DedupeError, DedupeLog, DedupeLogEntry, Fingerprint};
pub use ports::DedupeGuardApi;

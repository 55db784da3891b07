//! # LM-04 Offer Lifecycle
//!
//! Everything that happens to an offer after routing created it.
//!
//! **Subsystem ID:** 4
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Offer State Machine
//!
//! ```text
//!              view            accept (charge)          refund
//! offered ───────────→ viewed ─────────────→ accepted ─────────→ refunded
//!    │                   │
//!    │ decline / expire  │ decline / expire
//!    ▼                   ▼
//! declined | expired  declined | expired
//! ```
//!
//! ## Scheduler Sweeps
//!
//! | Sweep | Guard | Emits |
//! |-------|-------|-------|
//! | `process_expiring_offers` | active, unreminded, inside the window | `OfferReminderDue` |
//! | `process_expired_offers` | active, `expires_at <= now` | `OfferExpired`, `LeadRequeued` |
//! | `cleanup_routing_queue` | completed, past retention | - |
//! | `cleanup_dedupe_log` | past retention | - |
//!
//! The scheduler owns no timer. An external trigger calls [`OfferSchedulerApi::run_once`]
//! or the individual sweeps on its own cadence.
//!
//! ## Module Structure
//!
//! ```text
//! lm-04-offer-lifecycle/
//! ├── domain/          # ExpiryPolicy, reports, errors
//! ├── ports/           # OfferSchedulerApi, OfferDeskApi (inbound) + ledger/dedupe log (outbound)
//! ├── application/     # OfferScheduler, OfferDesk
//! └── config.rs        # LifecycleConfig
//! ```

#![warn(clippy::all)]

pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{OfferDesk, OfferScheduler};
pub use config::LifecycleConfig;
pub use domain::{AcceptReceipt, ExpiryPolicy, LifecycleError, StepReport, SweepReport};
pub use ports::{
    DedupeLogCleaner, GatewayError, LedgerGateway, LifecycleStores, OfferDeskApi,
    OfferSchedulerApi,
};

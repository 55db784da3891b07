//! # Marketplace Store
//!
//! In-memory adapters for the repository ports in `shared_types::ports`,
//! plus a static provider catalog.
//!
//! ## Guarantees
//!
//! | Operation | Guard evaluated under one lock |
//! |-----------|--------------------------------|
//! | `claim_lead` | status `new`/`queued`, or `routing` with an expired lease |
//! | `finish_lead` | caller still holds the lease |
//! | `insert_offer` | no active offer for the same `(lead, provider)` |
//! | `transition` | current status is one of `from` |
//! | `claim_due_reminders` | active, unreminded, inside the window |
//! | `expire_due_offers` | active and `expires_at <= now` |
//!
//! Every guard and its write happen under the same mutex, so concurrent
//! workers and overlapping scheduler runs cannot both win.

#![warn(clippy::all)]

pub mod catalog;
pub mod memory;

pub use catalog::{CatalogError, CatalogSnapshot, InMemoryProviderCatalog, PostalEntry};
pub use memory::InMemoryMarketplaceStore;

//! # Shared Types Crate
//!
//! This crate contains the marketplace data model, the repository ports that
//! persist it, and the time source every subsystem reads the clock through.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Conditional Writes**: Repository ports express state changes as guarded
//!   transitions (`claim_lead`, `expire_due_offers`), never read-then-write.
//! - **Injected Time**: Nothing reads the wall clock directly; all callers go
//!   through [`TimeSource`].

pub mod entities;
pub mod errors;
pub mod ports;
pub mod time;

pub use entities::*;
pub use errors::*;
pub use ports::*;
pub use time::*;

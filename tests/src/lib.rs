//! # Lead Marketplace Test Suite
//!
//! Cross-subsystem flows over the fully wired container.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # Wired marketplace on a manual clock
//! └── integration/
//!     ├── routing_flow.rs    # Lead → offers: eligibility, dedupe, pricing
//!     ├── lifecycle_flow.rs  # Reminders, expiry, acceptance, refunds, requeue
//!     └── concurrency.rs     # Claim races, overselling, overlapping sweeps
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p lm-tests
//! cargo test -p lm-tests integration::lifecycle_flow
//! cargo bench -p lm-tests
//! ```

#![allow(dead_code)]

#[cfg(test)]
pub mod harness;
pub mod integration;

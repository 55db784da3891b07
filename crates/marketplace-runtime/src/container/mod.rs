//! # Marketplace Container
//!
//! Holds every subsystem instance and wires the adapters between them.

pub mod config;
pub mod subsystems;

pub use config::{ConfigError, LogConfig, RuntimeConfig};
pub use subsystems::MarketplaceContainer;

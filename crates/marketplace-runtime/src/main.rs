//! # Lead Marketplace Runtime
//!
//! Entry point for the matching engine.
//!
//! ## Configuration
//!
//! - `LM_CONFIG`: path to a TOML file (optional)
//! - `LM_WORKERS`, `LM_SCHEDULER_INTERVAL_SECS`, `LM_DISPATCH_INTERVAL_SECS`,
//!   `LM_OFFER_TTL_MS`, `LM_LOG_LEVEL`, `LM_LOG_JSON`, `LM_CATALOG`: overrides
//! - `RUST_LOG`: takes precedence over the configured log level

use anyhow::{Context, Result};
use tracing::info;

use marketplace_runtime::logging::init_tracing;
use marketplace_runtime::{MarketplaceContainer, MarketplaceRuntime, RuntimeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = RuntimeConfig::from_env().context("Failed to load configuration")?;
    init_tracing(&config.log).context("Failed to initialize logging")?;
    config.validate().context("Invalid configuration")?;

    info!("===========================================");
    info!("  Lead Marketplace Runtime v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let container = MarketplaceContainer::new(config).context("Failed to load provider catalog")?;
    let runtime = MarketplaceRuntime::new(container);
    runtime.start();

    info!("Marketplace is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    runtime.shutdown().await;
    Ok(())
}

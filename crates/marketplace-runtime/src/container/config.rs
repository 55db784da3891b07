//! # Runtime Configuration
//!
//! One document for every subsystem plus the runtime's own knobs.
//!
//! ## Sources (later wins)
//!
//! 1. Built-in defaults
//! 2. TOML file named by `LM_CONFIG` (optional)
//! 3. `LM_*` environment overrides
//!
//! ```toml
//! scheduler_interval_secs = 60
//! catalog_path = "catalog.json"
//!
//! [routing]
//! workers = 8
//! offer_ttl_ms = 259200000
//!
//! [lifecycle]
//! reminder_window_ms = 7200000
//!
//! [log]
//! level = "info,lm_03_lead_routing=debug"
//! json = true
//! ```

use lm_01_wallet_ledger::WalletConfig;
use lm_02_dedupe_guard::DedupeConfig;
use lm_03_lead_routing::RoutingConfig;
use lm_04_offer_lifecycle::LifecycleConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the TOML file.
pub const CONFIG_PATH_VAR: &str = "LM_CONFIG";

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub routing: RoutingConfig,
    pub lifecycle: LifecycleConfig,
    pub dedupe: DedupeConfig,
    pub wallet: WalletConfig,
    pub log: LogConfig,

    /// Seconds between scheduler sweeps.
    pub scheduler_interval_secs: u64,

    /// Seconds between pending-queue and stale-lease dispatches.
    pub dispatch_interval_secs: u64,

    /// Queue entries submitted per dispatch.
    pub dispatch_batch: usize,

    /// JSON provider catalog loaded at startup.
    pub catalog_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            routing: RoutingConfig::default(),
            lifecycle: LifecycleConfig::default(),
            dedupe: DedupeConfig::default(),
            wallet: WalletConfig::default(),
            log: LogConfig::default(),
            scheduler_interval_secs: 60,
            dispatch_interval_secs: 5,
            dispatch_batch: 100,
            catalog_path: None,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Emit one JSON object per line.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("offer TTL must be non-zero")]
    ZeroOfferTtl,

    #[error("reminder window {window_ms}ms must be shorter than the offer TTL {ttl_ms}ms")]
    ReminderWindowTooLong { window_ms: u64, ttl_ms: u64 },

    #[error("at least one routing worker is required")]
    NoWorkers,

    #[error("{0} interval must be non-zero")]
    ZeroInterval(&'static str),

    #[error("dedupe bucket width must be non-zero")]
    ZeroDedupeBucket,
}

impl RuntimeConfig {
    /// Create a config for testing (fast subsystem configs, short intervals).
    pub fn for_testing() -> Self {
        Self {
            routing: RoutingConfig::for_testing(),
            lifecycle: LifecycleConfig::for_testing(),
            dedupe: DedupeConfig::for_testing(),
            wallet: WalletConfig::for_testing(),
            scheduler_interval_secs: 1,
            dispatch_interval_secs: 1,
            dispatch_batch: 10,
            ..Self::default()
        }
    }

    /// Parses a TOML document. Missing keys keep their defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Loads from the process environment: file first, then overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] over an arbitrary variable lookup.
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_PATH_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(lookup)?;
        Ok(config)
    }

    /// Applies `LM_*` overrides on top of the current values.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(workers) = parse_var(&lookup, "LM_WORKERS")? {
            self.routing.workers = workers;
        }
        if let Some(secs) = parse_var(&lookup, "LM_SCHEDULER_INTERVAL_SECS")? {
            self.scheduler_interval_secs = secs;
        }
        if let Some(secs) = parse_var(&lookup, "LM_DISPATCH_INTERVAL_SECS")? {
            self.dispatch_interval_secs = secs;
        }
        if let Some(ttl) = parse_var(&lookup, "LM_OFFER_TTL_MS")? {
            self.routing.offer_ttl_ms = ttl;
        }
        if let Some(json) = parse_var(&lookup, "LM_LOG_JSON")? {
            self.log.json = json;
        }
        if let Some(level) = lookup("LM_LOG_LEVEL") {
            self.log.level = level;
        }
        if let Some(path) = lookup("LM_CATALOG") {
            self.catalog_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    /// Rejects values no deployment can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ttl_ms = self.routing.offer_ttl_ms;
        if ttl_ms == 0 {
            return Err(ConfigError::ZeroOfferTtl);
        }
        if self.lifecycle.reminder_window_ms >= ttl_ms {
            return Err(ConfigError::ReminderWindowTooLong {
                window_ms: self.lifecycle.reminder_window_ms,
                ttl_ms,
            });
        }
        if self.routing.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.scheduler_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("scheduler"));
        }
        if self.dispatch_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("dispatch"));
        }
        if self.dedupe.bucket_ms == 0 {
            return Err(ConfigError::ZeroDedupeBucket);
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { key, value }),
        None => Ok(None),
    }
}

//! Configuration loading from TOML.
//!
//! Reads `config.toml` (or the file named by `PRICING_CONFIG`) and
//! deserializes into strongly-typed structs. Every field has a default,
//! so an empty file yields a usable configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::PriceMap;

/// Env var naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "PRICING_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
}

/// Settings for the host that drives the reconciler.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ControllerConfig {
    /// Upper bound on a single reconcile invocation.
    pub reconcile_timeout_secs: u64,
    /// First retry delay after a failed reconcile.
    pub error_backoff_base_secs: u64,
    /// Retry delay ceiling after repeated failures.
    pub error_backoff_max_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            reconcile_timeout_secs: 300,
            error_backoff_base_secs: 5,
            error_backoff_max_secs: 1000,
        }
    }
}

impl ControllerConfig {
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    pub fn error_backoff_base(&self) -> Duration {
        Duration::from_secs(self.error_backoff_base_secs)
    }

    pub fn error_backoff_max(&self) -> Duration {
        Duration::from_secs(self.error_backoff_max_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PricingConfig {
    pub spot_prices_path: PathBuf,
    pub on_demand_prices_path: PathBuf,
    /// Prices served before the first successful spot refresh.
    pub initial_spot: PriceMap,
    /// Prices served before the first successful on-demand refresh.
    pub initial_on_demand: PriceMap,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            spot_prices_path: PathBuf::from("pricing/spot.json"),
            on_demand_prices_path: PathBuf::from("pricing/on_demand.json"),
            initial_spot: PriceMap::new(),
            initial_on_demand: PriceMap::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Load from `PRICING_CONFIG` if set, else `config.toml`.
    pub fn load_default() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(&path)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let c = &self.controller;
        anyhow::ensure!(c.reconcile_timeout_secs > 0, "reconcile_timeout_secs must be positive");
        anyhow::ensure!(c.error_backoff_base_secs > 0, "error_backoff_base_secs must be positive");
        anyhow::ensure!(
            c.error_backoff_max_secs >= c.error_backoff_base_secs,
            "error_backoff_max_secs must be at least error_backoff_base_secs"
        );
        Ok(())
    }
}

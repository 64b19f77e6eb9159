//! File-backed pricing source.
//!
//! Each refresh re-reads a JSON object of `instance type -> hourly price`
//! and swaps it into the cache. A refresh that fails for any reason
//! leaves the previously cached prices in place.

use anyhow::Context;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::cache::PriceCache;
use super::PricingSource;
use crate::config::PricingConfig;
use crate::controller::context::ReconcileContext;
use crate::types::{PriceMap, PricingError, PricingUpdate};

pub struct FilePricingProvider {
    spot_path: PathBuf,
    on_demand_path: PathBuf,
    cache: PriceCache,
}

impl FilePricingProvider {
    pub fn new(spot_path: impl Into<PathBuf>, on_demand_path: impl Into<PathBuf>) -> Self {
        Self {
            spot_path: spot_path.into(),
            on_demand_path: on_demand_path.into(),
            cache: PriceCache::new(),
        }
    }

    /// Build from config, seeding the cache with any initial prices.
    pub fn from_config(cfg: &PricingConfig) -> Self {
        Self {
            spot_path: cfg.spot_prices_path.clone(),
            on_demand_path: cfg.on_demand_prices_path.clone(),
            cache: PriceCache::seeded(cfg.initial_spot.clone(), cfg.initial_on_demand.clone()),
        }
    }

    pub fn cache(&self) -> &PriceCache {
        &self.cache
    }

    fn path(&self, kind: PricingUpdate) -> &Path {
        match kind {
            PricingUpdate::Spot => &self.spot_path,
            PricingUpdate::OnDemand => &self.on_demand_path,
        }
    }

    async fn refresh(&self, kind: PricingUpdate, ctx: &ReconcileContext) -> Result<(), PricingError> {
        let path = self.path(kind);
        debug!(kind = %kind, path = %path.display(), "Refreshing prices from file");

        let prices = ctx.run(load_prices(kind, path)).await?;
        let count = prices.len();
        self.cache.replace(kind, prices);

        info!(kind = %kind, count, "Prices refreshed");
        Ok(())
    }
}

async fn load_prices(kind: PricingUpdate, path: &Path) -> Result<PriceMap, PricingError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {kind} prices: {}", path.display()))?;
    let prices: PriceMap = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {kind} prices: {}", path.display()))?;
    validate(kind, &prices)?;
    Ok(prices)
}

/// Reject empty mappings and negative prices.
fn validate(kind: PricingUpdate, prices: &PriceMap) -> Result<(), PricingError> {
    if prices.is_empty() {
        return Err(PricingError::NotFound(kind));
    }
    if let Some((instance_type, price)) = prices.iter().find(|(_, p)| **p < Decimal::ZERO) {
        return Err(PricingError::InvalidPrice {
            kind,
            instance_type: instance_type.clone(),
            price: *price,
        });
    }
    Ok(())
}

#[async_trait]
impl PricingSource for FilePricingProvider {
    async fn update_spot_pricing(&self, ctx: &ReconcileContext) -> Result<(), PricingError> {
        self.refresh(PricingUpdate::Spot, ctx).await
    }

    async fn update_on_demand_pricing(&self, ctx: &ReconcileContext) -> Result<(), PricingError> {
        self.refresh(PricingUpdate::OnDemand, ctx).await
    }

    fn spot_prices(&self) -> PriceMap {
        self.cache.spot_prices()
    }

    fn on_demand_prices(&self) -> PriceMap {
        self.cache.on_demand_prices()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

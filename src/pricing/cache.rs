//! In-memory price cache.
//!
//! Spot and on-demand prices live behind separate locks so the two
//! refreshes never contend with each other. Each side is replaced
//! wholesale and stamped with the time of replacement.

use chrono::{DateTime, Utc};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::types::{PriceMap, PricingUpdate};

#[derive(Debug, Default)]
struct Entry {
    prices: PriceMap,
    updated_at: Option<DateTime<Utc>>,
}

/// Thread-safe spot + on-demand price store.
#[derive(Debug, Default)]
pub struct PriceCache {
    spot: RwLock<Entry>,
    on_demand: RwLock<Entry>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the cache with prices known before the first refresh.
    /// Seeded prices carry no update timestamp.
    pub fn seeded(spot: PriceMap, on_demand: PriceMap) -> Self {
        Self {
            spot: RwLock::new(Entry {
                prices: spot,
                updated_at: None,
            }),
            on_demand: RwLock::new(Entry {
                prices: on_demand,
                updated_at: None,
            }),
        }
    }

    pub fn replace_spot(&self, prices: PriceMap) {
        self.replace(PricingUpdate::Spot, prices);
    }

    pub fn replace_on_demand(&self, prices: PriceMap) {
        self.replace(PricingUpdate::OnDemand, prices);
    }

    /// Swap one side of the cache for a fresh mapping.
    pub fn replace(&self, kind: PricingUpdate, prices: PriceMap) {
        let count = prices.len();
        let mut entry = self.write(kind);
        entry.prices = prices;
        entry.updated_at = Some(Utc::now());
        debug!(kind = %kind, count, "Price cache replaced");
    }

    pub fn spot_prices(&self) -> PriceMap {
        self.read(PricingUpdate::Spot).prices.clone()
    }

    pub fn on_demand_prices(&self) -> PriceMap {
        self.read(PricingUpdate::OnDemand).prices.clone()
    }

    pub fn spot_updated_at(&self) -> Option<DateTime<Utc>> {
        self.read(PricingUpdate::Spot).updated_at
    }

    pub fn on_demand_updated_at(&self) -> Option<DateTime<Utc>> {
        self.read(PricingUpdate::OnDemand).updated_at
    }

    fn lock(&self, kind: PricingUpdate) -> &RwLock<Entry> {
        match kind {
            PricingUpdate::Spot => &self.spot,
            PricingUpdate::OnDemand => &self.on_demand,
        }
    }

    // A writer that panicked mid-replace still leaves a whole map behind,
    // so poisoned locks are safe to keep using.
    fn read(&self, kind: PricingUpdate) -> RwLockReadGuard<'_, Entry> {
        self.lock(kind).read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self, kind: PricingUpdate) -> RwLockWriteGuard<'_, Entry> {
        self.lock(kind).write().unwrap_or_else(|e| e.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Pricing data sources.
//!
//! Defines the `PricingSource` capability the reconciler drives, plus a
//! thread-safe price cache and a file-backed source built on it.

pub mod cache;
pub mod file;

use async_trait::async_trait;

use crate::controller::context::ReconcileContext;
use crate::types::{PriceMap, PricingError};

/// A provider of spot and on-demand compute prices.
///
/// The two refreshes are independent: each mutates only its own side of
/// the provider's cache, so they may run concurrently in any order.
/// Implementors own whatever synchronization that requires.
#[async_trait]
pub trait PricingSource: Send + Sync {
    /// Refresh spot prices. Must return promptly once `ctx` is done.
    async fn update_spot_pricing(&self, ctx: &ReconcileContext) -> Result<(), PricingError>;

    /// Refresh on-demand prices. Must return promptly once `ctx` is done.
    async fn update_on_demand_pricing(&self, ctx: &ReconcileContext) -> Result<(), PricingError>;

    /// Current spot prices. Read-only, non-blocking.
    fn spot_prices(&self) -> PriceMap;

    /// Current on-demand prices. Read-only, non-blocking.
    fn on_demand_prices(&self) -> PriceMap;
}

//! Pricing reconciler.
//!
//! Refreshes spot and on-demand prices in parallel every twelve hours.
//! Each refresh runs as its own task and reports into its own slot, so a
//! slow or failing refresh never holds up or masks the other. Failures
//! are folded into a single `PricingUpdateFailed`; the requeue delay is
//! the same either way and retry policy on top is left to the host.

use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::context::ReconcileContext;
use super::{Builder, ReconcileOutcome, Reconciler, Request};
use crate::pricing::PricingSource;
use crate::types::{PriceMap, PricingError, PricingUpdate, PricingUpdateFailed, UpdateFailure};

/// Delay before the next reconcile, regardless of outcome.
pub const REQUEUE_AFTER: Duration = Duration::from_secs(12 * 60 * 60);

pub const CONTROLLER_NAME: &str = "pricing";

pub struct PricingController {
    source: Arc<dyn PricingSource>,
}

impl PricingController {
    pub fn new(source: Arc<dyn PricingSource>) -> Self {
        Self { source }
    }

    /// Run both refreshes to completion and fold their failures.
    ///
    /// The refresh tasks live in a `JoinSet`, so dropping this future
    /// aborts them: no refresh outlives the invocation that started it.
    pub async fn refresh(&self, ctx: &ReconcileContext) -> ReconcileOutcome<PricingUpdateFailed> {
        debug!(
            deadline_in_ms = ctx
                .deadline()
                .map(|d| d.saturating_duration_since(Instant::now()).as_millis() as u64),
            "Starting pricing refresh"
        );

        let mut tasks = JoinSet::new();
        for (slot, &update) in PricingUpdate::ALL.iter().enumerate() {
            let source = Arc::clone(&self.source);
            let ctx = ctx.clone();
            tasks.spawn(async move {
                let res = AssertUnwindSafe(ctx.run(update.apply(source.as_ref(), &ctx)))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| Err(PricingError::Panicked(panic_message(payload))));
                (slot, res)
            });
        }

        // Slot i belongs to PricingUpdate::ALL[i] and is written once.
        let mut slots: Vec<Option<Result<(), PricingError>>> =
            PricingUpdate::ALL.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            // Panics are caught in the task, so a join error means the
            // runtime cancelled it; its slot stays empty.
            if let Ok((slot, res)) = joined {
                slots[slot] = Some(res);
            }
        }

        let failures: Vec<UpdateFailure> = PricingUpdate::ALL
            .iter()
            .zip(slots)
            .filter_map(|(&update, slot)| match slot.unwrap_or_else(|| Err(PricingError::Cancelled)) {
                Ok(()) => None,
                Err(reason) => {
                    if reason.is_context() {
                        info!(update = %update, error = %reason, "Pricing update interrupted");
                    } else {
                        warn!(update = %update, error = %reason, "Pricing update failed");
                    }
                    Some(UpdateFailure::new(update, reason))
                }
            })
            .collect();

        self.log_snapshots();

        ReconcileOutcome::requeue_after(REQUEUE_AFTER).with_error(PricingUpdateFailed::combine(failures))
    }

    fn log_snapshots(&self) {
        let on_demand = self.source.on_demand_prices();
        let spot = self.source.spot_prices();
        info!(
            on_demand = on_demand.len(),
            spot = spot.len(),
            "Pricing snapshot after update"
        );
        debug!(debugging_topic = "on-demand", prices = ?sorted(&on_demand), "after");
        debug!(debugging_topic = "spot", prices = ?sorted(&spot), "after");
    }
}

impl PricingUpdate {
    async fn apply(self, source: &dyn PricingSource, ctx: &ReconcileContext) -> Result<(), PricingError> {
        match self {
            PricingUpdate::Spot => source.update_spot_pricing(ctx).await,
            PricingUpdate::OnDemand => source.update_on_demand_pricing(ctx).await,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn sorted(prices: &PriceMap) -> BTreeMap<&str, String> {
    prices.iter().map(|(k, v)| (k.as_str(), v.to_string())).collect()
}

#[async_trait]
impl Reconciler for PricingController {
    type Error = PricingUpdateFailed;

    fn name(&self) -> &'static str {
        CONTROLLER_NAME
    }

    async fn reconcile(
        &self,
        ctx: &ReconcileContext,
        _request: Request,
    ) -> ReconcileOutcome<PricingUpdateFailed> {
        self.refresh(ctx).await
    }

    fn builder(&self) -> Builder {
        Builder::Singleton
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

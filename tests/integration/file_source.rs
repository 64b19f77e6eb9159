//! End-to-end reconcile over the file-backed pricing source.

use rust_decimal_macros::dec;
use std::path::PathBuf;
use std::sync::Arc;

use pricing_controller::controller::context::ReconcileContext;
use pricing_controller::controller::pricing::{PricingController, REQUEUE_AFTER};
use pricing_controller::controller::{Reconciler, Request};
use pricing_controller::pricing::file::FilePricingProvider;
use pricing_controller::pricing::PricingSource;
use pricing_controller::types::PricingUpdate;

struct TempDir(PathBuf);

impl TempDir {
    fn new() -> Self {
        let mut p = std::env::temp_dir();
        p.push(format!("pricing_it_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&p).unwrap();
        Self(p)
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.0.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

#[tokio::test]
async fn test_reconcile_loads_both_files() {
    let dir = TempDir::new();
    let spot = dir.write("spot.json", r#"{"m5.large": 0.03125, "c5.xlarge": 0.0625}"#);
    let od = dir.write("on_demand.json", r#"{"m5.large": 0.125}"#);
    let provider = Arc::new(FilePricingProvider::new(spot, od));
    let controller = PricingController::new(provider.clone());

    let outcome = controller
        .reconcile(&ReconcileContext::background(), Request::default())
        .await;

    assert!(outcome.is_ok(), "unexpected error: {:?}", outcome.error);
    assert_eq!(outcome.requeue_after, REQUEUE_AFTER);
    assert_eq!(provider.spot_prices()["c5.xlarge"], dec!(0.0625));
    assert_eq!(provider.on_demand_prices()["m5.large"], dec!(0.125));
    assert!(provider.cache().spot_updated_at().is_some());
    assert!(provider.cache().on_demand_updated_at().is_some());
}

#[tokio::test]
async fn test_missing_on_demand_file_keeps_spot_update() {
    let dir = TempDir::new();
    let spot = dir.write("spot.json", r#"{"m5.large": 0.03125}"#);
    let provider = Arc::new(FilePricingProvider::new(spot, dir.0.join("absent.json")));
    let controller = PricingController::new(provider.clone());

    let outcome = controller
        .reconcile(&ReconcileContext::background(), Request::default())
        .await;

    let err = outcome.error.unwrap();
    assert!(err.failed(PricingUpdate::OnDemand));
    assert!(!err.failed(PricingUpdate::Spot));
    assert!(err.to_string().contains("Failed to read on-demand prices"));
    assert_eq!(provider.spot_prices().len(), 1);
    assert!(provider.on_demand_prices().is_empty());
    assert_eq!(outcome.requeue_after, REQUEUE_AFTER);
}

#[tokio::test]
async fn test_second_reconcile_picks_up_new_prices() {
    let dir = TempDir::new();
    let spot = dir.write("spot.json", r#"{"m5.large": 0.03125}"#);
    let od = dir.write("on_demand.json", r#"{"m5.large": 0.125}"#);
    let provider = Arc::new(FilePricingProvider::new(spot, od));
    let controller = PricingController::new(provider.clone());
    let ctx = ReconcileContext::background();

    assert!(controller.reconcile(&ctx, Request::default()).await.is_ok());
    dir.write("spot.json", r#"{"m5.large": 0.046875, "r5.large": 0.0390625}"#);
    assert!(controller.reconcile(&ctx, Request::default()).await.is_ok());

    let spot = provider.spot_prices();
    assert_eq!(spot.len(), 2);
    assert_eq!(spot["m5.large"], dec!(0.046875));
}

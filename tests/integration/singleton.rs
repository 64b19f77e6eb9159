//! The pricing reconciler driven by the singleton host.

use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use pricing_controller::controller::pricing::PricingController;
use pricing_controller::controller::singleton::{DriverSettings, SingletonDriver};
use pricing_controller::types::PricingUpdate;

use crate::fake_pricing::{prices, Behavior, FakePricing};

fn settings() -> DriverSettings {
    DriverSettings {
        reconcile_timeout: Duration::from_millis(200),
        error_backoff_base: Duration::from_millis(10),
        error_backoff_max: Duration::from_millis(40),
    }
}

#[tokio::test]
async fn test_trigger_runs_another_reconcile() {
    let fake = Arc::new(FakePricing::new(
        Behavior::Succeed(prices(&[("m5.large", dec!(0.03))])),
        Behavior::Succeed(prices(&[("m5.large", dec!(0.09))])),
    ));
    let controller = Arc::new(PricingController::new(fake.clone()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (driver, trigger) = SingletonDriver::new(controller, settings(), shutdown_rx).unwrap();
    let handle = tokio::spawn(driver.run());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fake.calls(PricingUpdate::Spot), 1);

    assert!(trigger.fire());
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown_tx.send(true).unwrap();

    let report = handle.await.unwrap();
    assert_eq!(report.invocations, 2);
    assert_eq!(report.failures, 0);
    assert_eq!(fake.calls(PricingUpdate::OnDemand), 2);
}

#[tokio::test]
async fn test_failed_reconcile_is_retried_before_requeue() {
    let fake = Arc::new(FakePricing::new(
        Behavior::Succeed(prices(&[("m5.large", dec!(0.03))])),
        Behavior::Fail("rate limited"),
    ));
    let controller = Arc::new(PricingController::new(fake.clone()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (driver, _trigger) = SingletonDriver::new(controller, settings(), shutdown_rx).unwrap();
    let handle = tokio::spawn(driver.run());

    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown_tx.send(true).unwrap();

    let report = handle.await.unwrap();
    assert!(report.invocations >= 3, "expected backoff retries, got {report:?}");
    assert_eq!(report.failures, report.invocations);
    assert_eq!(fake.cached(PricingUpdate::Spot)["m5.large"], dec!(0.03));
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_reconcile() {
    let fake = Arc::new(FakePricing::new(Behavior::Hang, Behavior::Hang));
    let controller = Arc::new(PricingController::new(fake.clone()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let settings = DriverSettings {
        reconcile_timeout: Duration::from_secs(30),
        ..settings()
    };
    let (driver, _trigger) = SingletonDriver::new(controller, settings, shutdown_rx).unwrap();
    let handle = tokio::spawn(driver.run());

    tokio::time::sleep(Duration::from_millis(30)).await;
    shutdown_tx.send(true).unwrap();

    let report = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("driver should stop promptly")
        .unwrap();
    assert_eq!(report.invocations, 1);
    assert_eq!(report.failures, 1);
}

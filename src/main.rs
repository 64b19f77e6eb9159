//! Pricing controller entry point.
//!
//! Loads configuration, initialises structured logging, builds the
//! file-backed pricing source, and drives the pricing reconciler as a
//! singleton until Ctrl+C.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use pricing_controller::config::AppConfig;
use pricing_controller::controller::pricing::{PricingController, REQUEUE_AFTER};
use pricing_controller::controller::singleton::{DriverSettings, SingletonDriver};
use pricing_controller::controller::Reconciler;
use pricing_controller::pricing::file::FilePricingProvider;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load_default()?;

    init_logging();

    let provider = FilePricingProvider::from_config(&cfg.pricing);
    info!(
        spot_path = %cfg.pricing.spot_prices_path.display(),
        on_demand_path = %cfg.pricing.on_demand_prices_path.display(),
        seeded_spot = provider.cache().spot_prices().len(),
        seeded_on_demand = provider.cache().on_demand_prices().len(),
        "Pricing source ready"
    );

    let controller = Arc::new(PricingController::new(Arc::new(provider)));
    let settings = DriverSettings::from(&cfg.controller);
    info!(
        controller = controller.name(),
        requeue_after_secs = REQUEUE_AFTER.as_secs(),
        reconcile_timeout_secs = settings.reconcile_timeout.as_secs(),
        "Registering controller"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (driver, _trigger) = SingletonDriver::new(controller, settings, shutdown_rx)
        .context("Failed to register pricing controller")?;
    let mut driver = tokio::spawn(driver.run());

    tokio::select! {
        res = &mut driver => {
            let report = res.context("Controller task failed")?;
            info!(invocations = report.invocations, "Controller exited");
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received.");
        }
    }

    shutdown_tx.send_replace(true);
    let report = driver.await.context("Controller task failed")?;
    info!(
        invocations = report.invocations,
        failures = report.failures,
        "Pricing controller shut down cleanly."
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pricing_controller=info"));

    let json_logging = std::env::var("PRICING_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}

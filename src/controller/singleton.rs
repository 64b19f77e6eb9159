//! Singleton host for reconcilers.
//!
//! Drives one reconciler from a single loop, so invocations are
//! serialized by construction: the next one starts only after the
//! previous one has returned. Between invocations the driver sleeps for
//! the requested requeue delay (or an error backoff), wakes early on a
//! trigger, and exits on shutdown.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info};

use super::context::ReconcileContext;
use super::{Builder, Reconciler, Request};
use crate::config::ControllerConfig;

/// Host-side timing knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverSettings {
    pub reconcile_timeout: Duration,
    pub error_backoff_base: Duration,
    pub error_backoff_max: Duration,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self::from(&ControllerConfig::default())
    }
}

impl From<&ControllerConfig> for DriverSettings {
    fn from(cfg: &ControllerConfig) -> Self {
        Self {
            reconcile_timeout: cfg.reconcile_timeout(),
            error_backoff_base: cfg.error_backoff_base(),
            error_backoff_max: cfg.error_backoff_max(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("controller {0} does not declare singleton execution")]
    NotSingleton(&'static str),
}

/// Requests an immediate reconcile. Cloneable; triggers that arrive
/// while one is already pending are coalesced into it.
#[derive(Debug, Clone)]
pub struct Trigger {
    tx: mpsc::Sender<()>,
}

impl Trigger {
    /// Returns `false` when the trigger was coalesced into a pending one
    /// or the driver has stopped.
    pub fn fire(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }
}

/// Counters returned when the driver stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverReport {
    pub invocations: u64,
    pub failures: u64,
}

/// Exponential backoff: base, 2×base, 4×base, … capped at max.
#[derive(Debug)]
struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl Backoff {
    fn new(base: Duration, max: Duration) -> Self {
        Self { base, max, failures: 0 }
    }

    fn next(&mut self) -> Duration {
        let factor = 1u32.checked_shl(self.failures).unwrap_or(u32::MAX);
        self.failures = self.failures.saturating_add(1);
        self.base.saturating_mul(factor).min(self.max)
    }

    fn reset(&mut self) {
        self.failures = 0;
    }
}

pub struct SingletonDriver<R: Reconciler> {
    reconciler: Arc<R>,
    settings: DriverSettings,
    triggers: mpsc::Receiver<()>,
    shutdown: watch::Receiver<bool>,
}

impl<R: Reconciler> SingletonDriver<R> {
    /// Register `reconciler`. The driver stops once `shutdown` turns
    /// `true` or its sender is dropped.
    pub fn new(
        reconciler: Arc<R>,
        settings: DriverSettings,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(Self, Trigger), RegistrationError> {
        if reconciler.builder() != Builder::Singleton {
            return Err(RegistrationError::NotSingleton(reconciler.name()));
        }
        let (tx, triggers) = mpsc::channel(1);
        let driver = Self {
            reconciler,
            settings,
            triggers,
            shutdown,
        };
        Ok((driver, Trigger { tx }))
    }

    /// Reconcile immediately, then keep reconciling until shutdown.
    pub async fn run(mut self) -> DriverReport {
        let name = self.reconciler.name();
        let mut report = DriverReport::default();
        let mut backoff = Backoff::new(self.settings.error_backoff_base, self.settings.error_backoff_max);

        info!(controller = name, "Starting singleton controller");

        while !*self.shutdown.borrow() {
            let ctx = ReconcileContext::from_signal(self.shutdown.clone())
                .with_timeout(self.settings.reconcile_timeout);
            let started = Instant::now();
            let outcome = self.reconciler.reconcile(&ctx, Request::default()).await;
            report.invocations += 1;

            let requeue_after = outcome.requeue_after;
            let delay = match outcome.into_result() {
                Ok(requeue_after) => {
                    backoff.reset();
                    info!(
                        controller = name,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        requeue_after_secs = requeue_after.as_secs(),
                        "Reconcile succeeded"
                    );
                    requeue_after
                }
                Err(e) => {
                    report.failures += 1;
                    let delay = backoff.next().min(requeue_after);
                    error!(
                        controller = name,
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Reconcile failed"
                    );
                    delay
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                Some(()) = self.triggers.recv() => {
                    debug!(controller = name, "Reconcile triggered");
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(
            controller = name,
            invocations = report.invocations,
            failures = report.failures,
            "Singleton controller stopped"
        );
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Shared types for the pricing controller.
//!
//! The price model, the two refresh units, and the error types that
//! flow from a pricing source up through the reconciler to its host.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt;

use crate::controller::context::ContextError;

// ---------------------------------------------------------------------------
// Prices
// ---------------------------------------------------------------------------

/// Instance-class identifier → hourly price.
pub type PriceMap = HashMap<String, Decimal>;

/// Which side of the pricing cache a refresh unit updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PricingUpdate {
    Spot,
    OnDemand,
}

impl PricingUpdate {
    /// Every refresh unit, in fan-out order. Slot `i` of a reconcile
    /// always belongs to `ALL[i]`.
    pub const ALL: &'static [PricingUpdate] = &[PricingUpdate::Spot, PricingUpdate::OnDemand];

    /// Stable label used in logs and error text.
    pub fn label(&self) -> &'static str {
        match self {
            PricingUpdate::Spot => "spot",
            PricingUpdate::OnDemand => "on-demand",
        }
    }
}

impl fmt::Display for PricingUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why a single pricing refresh failed.
#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("context canceled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("no {0} pricing found")]
    NotFound(PricingUpdate),

    #[error("invalid {kind} price for {instance_type}: {price}")]
    InvalidPrice {
        kind: PricingUpdate,
        instance_type: String,
        price: Decimal,
    },

    #[error("refresh task panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PricingError {
    /// Whether this failure came from the execution context rather than
    /// from the source itself.
    pub fn is_context(&self) -> bool {
        matches!(self, PricingError::Cancelled | PricingError::DeadlineExceeded)
    }
}

impl From<ContextError> for PricingError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Cancelled => PricingError::Cancelled,
            ContextError::DeadlineExceeded => PricingError::DeadlineExceeded,
        }
    }
}

/// A single refresh unit's failure, labelled with its origin.
#[derive(Debug, thiserror::Error)]
pub enum UpdateFailure {
    #[error("updating spot pricing, {0}")]
    SpotUpdateFailed(#[source] PricingError),

    #[error("updating on-demand pricing, {0}")]
    OnDemandUpdateFailed(#[source] PricingError),
}

impl UpdateFailure {
    pub fn new(update: PricingUpdate, reason: PricingError) -> Self {
        match update {
            PricingUpdate::Spot => UpdateFailure::SpotUpdateFailed(reason),
            PricingUpdate::OnDemand => UpdateFailure::OnDemandUpdateFailed(reason),
        }
    }

    /// The unit that failed.
    pub fn update(&self) -> PricingUpdate {
        match self {
            UpdateFailure::SpotUpdateFailed(_) => PricingUpdate::Spot,
            UpdateFailure::OnDemandUpdateFailed(_) => PricingUpdate::OnDemand,
        }
    }

    /// The raw reason reported by the unit.
    pub fn reason(&self) -> &PricingError {
        match self {
            UpdateFailure::SpotUpdateFailed(e) | UpdateFailure::OnDemandUpdateFailed(e) => e,
        }
    }
}

/// Aggregate of every refresh unit that failed during one reconcile.
///
/// Never constructed empty: a reconcile with no failures carries no error.
#[derive(Debug, thiserror::Error)]
#[error("updating pricing, {}", join_failures(.failures))]
pub struct PricingUpdateFailed {
    failures: Vec<UpdateFailure>,
}

impl PricingUpdateFailed {
    /// Fold per-unit failures into one error. Returns `None` when there
    /// is nothing to report.
    pub fn combine(failures: Vec<UpdateFailure>) -> Option<Self> {
        if failures.is_empty() {
            None
        } else {
            Some(Self { failures })
        }
    }

    pub fn failures(&self) -> &[UpdateFailure] {
        &self.failures
    }

    /// Whether the given unit is among the failures.
    pub fn failed(&self, update: PricingUpdate) -> bool {
        self.failures.iter().any(|f| f.update() == update)
    }
}

fn join_failures(failures: &[UpdateFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

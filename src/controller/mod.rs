//! Reconciliation controllers and the host contract that drives them.

pub mod context;
pub mod pricing;
pub mod singleton;

use async_trait::async_trait;
use std::time::Duration;

use context::ReconcileContext;

/// Identity of whatever triggered a reconcile. Global reconcilers ignore it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub name: Option<String>,
}

/// What one reconcile invocation hands back to its host: an optional
/// error and when to run again.
#[derive(Debug)]
pub struct ReconcileOutcome<E> {
    pub requeue_after: Duration,
    pub error: Option<E>,
}

impl<E> ReconcileOutcome<E> {
    pub fn requeue_after(delay: Duration) -> Self {
        Self {
            requeue_after: delay,
            error: None,
        }
    }

    pub fn with_error(mut self, error: Option<E>) -> Self {
        self.error = error;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<Duration, E> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.requeue_after),
        }
    }
}

/// How a reconciler asks to be registered with its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Builder {
    /// At most one invocation in flight across the whole process.
    Singleton,
}

/// A periodic control loop the host can drive.
#[async_trait]
pub trait Reconciler: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Constant name used for registration and log keying.
    fn name(&self) -> &'static str;

    async fn reconcile(
        &self,
        ctx: &ReconcileContext,
        request: Request,
    ) -> ReconcileOutcome<Self::Error>;

    fn builder(&self) -> Builder;
}

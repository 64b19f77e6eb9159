//! Cancellable execution context for reconcile invocations.
//!
//! A `ReconcileContext` carries a cancellation signal (a `watch` channel
//! flipped to `true`) and an optional deadline. Clones share the signal,
//! so cancelling once reaches every task working under the context.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Why a context finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("context canceled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug, Clone)]
pub struct ReconcileContext {
    cancel: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Cancels every clone of the context it was created with.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // send_replace never fails, even with no receivers left
        self.sender.send_replace(true);
    }
}

impl ReconcileContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self {
            cancel: None,
            deadline: None,
        }
    }

    /// A fresh context plus the handle that cancels it.
    pub fn with_cancel() -> (Self, CancelHandle) {
        let (sender, receiver) = watch::channel(false);
        (Self::from_signal(receiver), CancelHandle { sender })
    }

    /// Derive a context from an existing shutdown signal. The context is
    /// cancelled once the watched value becomes `true`.
    pub fn from_signal(signal: watch::Receiver<bool>) -> Self {
        Self {
            cancel: Some(signal),
            deadline: None,
        }
    }

    /// Child context sharing this one's cancellation, expiring after `timeout`
    /// or at the parent's deadline, whichever comes first.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        };
        Self {
            cancel: self.cancel.clone(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `Some` once the context has finished. Cancellation wins over an
    /// expired deadline.
    pub fn err(&self) -> Option<ContextError> {
        if self.cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    /// Never resolves for a background context.
    pub async fn done(&self) -> ContextError {
        if let Some(err) = self.err() {
            return err;
        }

        let cancelled = wait_cancelled(self.cancel.clone());
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = cancelled => ContextError::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
                }
            }
            None => {
                cancelled.await;
                ContextError::Cancelled
            }
        }
    }

    /// Run `fut` unless the context finishes first. A context that is
    /// already done never polls `fut`.
    pub async fn run<F, T, E>(&self, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<ContextError>,
    {
        tokio::select! {
            biased;
            err = self.done() => Err(err.into()),
            res = fut => res,
        }
    }
}

async fn wait_cancelled(signal: Option<watch::Receiver<bool>>) {
    let Some(mut rx) = signal else {
        return futures::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone without cancelling: this context can no longer
            // be cancelled.
            return futures::future::pending().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

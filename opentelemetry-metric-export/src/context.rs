//! Caller supplied deadlines and cancellation for exporter operations.
//!
//! Every [`PushMetricExporter`] operation receives an [`ExportContext`]. The
//! context is the hard upper bound on how long the operation may block:
//! exporters check it at I/O boundaries with [`ExportContext::check`] and wrap
//! suspending work in [`ExportContext::run`], which abandons the work as soon
//! as the deadline passes or the caller cancels.
//!
//! Timers come from `futures-timer`, so contexts work the same under tokio and
//! under a plain `futures_executor::block_on`.
//!
//! [`PushMetricExporter`]: crate::PushMetricExporter
use std::future::Future;
use std::pin::pin;
use std::time::{Duration, Instant};

use futures_timer::Delay;
use futures_util::future::{self, Either};
use tokio::sync::watch;

use crate::error::{OTelSdkError, OTelSdkResult};

/// Deadline and cancellation signal for a single exporter call.
///
/// Contexts are cheap to clone; clones share the cancellation signal.
///
/// ```
/// use std::time::Duration;
/// use opentelemetry_metric_export::ExportContext;
///
/// let (ctx, handle) = ExportContext::with_timeout(Duration::from_secs(5)).cancellable();
/// assert!(ctx.check().is_ok());
/// handle.cancel();
/// assert!(ctx.check().is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct ExportContext {
    deadline: Option<Instant>,
    budget: Duration,
    cancellation: Option<watch::Receiver<bool>>,
}

/// Cancels every [`ExportContext`] created from the same
/// [`ExportContext::cancellable`] call.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancel the associated contexts. Calls in progress return
    /// [`OTelSdkError::Cancelled`] at their next suspension point.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

impl ExportContext {
    /// A context without deadline that is never cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        ExportContext {
            deadline: Instant::now().checked_add(timeout),
            budget: timeout,
            cancellation: None,
        }
    }

    /// A context with an absolute deadline. A deadline in the past yields a
    /// context that is already expired.
    pub fn with_deadline(deadline: Instant) -> Self {
        ExportContext {
            deadline: Some(deadline),
            budget: deadline.saturating_duration_since(Instant::now()),
            cancellation: None,
        }
    }

    /// Make this context cancellable, returning the handle that cancels it.
    ///
    /// Replaces any cancellation signal the context previously carried.
    pub fn cancellable(mut self) -> (Self, CancelHandle) {
        let (sender, receiver) = watch::channel(false);
        self.cancellation = Some(receiver);
        (self, CancelHandle { sender })
    }

    /// Derive a context that expires at the earlier of this context's
    /// deadline and `timeout` from now. Cancellation is shared with `self`.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now().checked_add(timeout);
        let (deadline, budget) = match (self.deadline, candidate) {
            (Some(parent), Some(child)) if parent <= child => (Some(parent), self.budget),
            (None, None) => (None, Duration::ZERO),
            (Some(parent), None) => (Some(parent), self.budget),
            (_, child) => (child, timeout),
        };
        ExportContext {
            deadline,
            budget,
            cancellation: self.cancellation.clone(),
        }
    }

    /// The instant after which the operation must give up, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline. `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Whether the caller cancelled this context.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map(|receiver| *receiver.borrow())
            .unwrap_or(false)
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }

    /// Returns an error if the context is cancelled or its deadline passed.
    pub fn check(&self) -> OTelSdkResult {
        if self.is_cancelled() {
            Err(OTelSdkError::Cancelled)
        } else if self.is_expired() {
            Err(OTelSdkError::Timeout(self.budget))
        } else {
            Ok(())
        }
    }

    /// Drive `operation` until it completes, the deadline passes, or the
    /// context is cancelled, whichever happens first.
    ///
    /// The context is checked before `operation` is polled even once, so an
    /// expired context never starts the work. When the context fires first
    /// `operation` is dropped, which aborts it at its current suspension point.
    pub async fn run<F, T>(&self, operation: F) -> Result<T, OTelSdkError>
    where
        F: Future<Output = Result<T, OTelSdkError>>,
    {
        self.check()?;
        let operation = pin!(operation);
        let interrupted = pin!(self.interrupted());
        match future::select(operation, interrupted).await {
            Either::Left((result, _)) => result,
            Either::Right((err, _)) => Err(err),
        }
    }

    /// Resolves with the error describing why the context fired. Never
    /// resolves for a context without deadline or cancellation.
    async fn interrupted(&self) -> OTelSdkError {
        let expired = pin!(async {
            match self.remaining() {
                Some(remaining) => {
                    Delay::new(remaining).await;
                    OTelSdkError::Timeout(self.budget)
                }
                None => future::pending().await,
            }
        });
        let cancelled = pin!(async {
            if let Some(mut receiver) = self.cancellation.clone() {
                let fired = receiver.wait_for(|cancelled| *cancelled).await.is_ok();
                if fired {
                    return OTelSdkError::Cancelled;
                }
            }
            // The handle was dropped without cancelling.
            future::pending().await
        });
        future::select(expired, cancelled).await.factor_first().0
    }
}

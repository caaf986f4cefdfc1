//! Errors returned by metric exporters.
use std::sync::PoisonError;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`PushMetricExporter`] operations.
///
/// [`OTelSdkError::AlreadyShutdown`] is the well-known shutdown sentinel. It
/// compares equal to itself, so callers can special case "exporter already
/// closed" without looking at the message:
///
/// ```
/// use opentelemetry_metric_export::error::OTelSdkError;
///
/// let err = OTelSdkError::AlreadyShutdown;
/// assert_eq!(err, OTelSdkError::AlreadyShutdown);
/// assert!(err.is_shutdown());
/// ```
///
/// Every other variant describes a failed transmission, flush or teardown.
/// Such errors are unrecoverable from the pipeline's point of view: they are
/// reported, never retried by the caller.
///
/// [`PushMetricExporter`]: crate::PushMetricExporter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OTelSdkError {
    /// Shutdown has already been invoked.
    ///
    /// Returned by every export after shutdown, and by shutdown itself when
    /// it is invoked more than once.
    #[error("Shutdown already invoked")]
    AlreadyShutdown,

    /// The operation did not finish within the deadline of its
    /// [`ExportContext`](crate::ExportContext). Carries the time budget the
    /// operation was given.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The [`ExportContext`](crate::ExportContext) was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// Operation failed due to an internal error.
    ///
    /// The error message is intended for logging purposes only and should not
    /// be used to make programmatic decisions.
    #[error("Operation failed: {0}")]
    InternalFailure(String),
}

impl OTelSdkError {
    /// Returns `true` if this is the shutdown sentinel.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, OTelSdkError::AlreadyShutdown)
    }
}

impl<T> From<PoisonError<T>> for OTelSdkError {
    fn from(err: PoisonError<T>) -> Self {
        OTelSdkError::InternalFailure(format!("Mutex poisoned: {err}"))
    }
}

/// A specialized `Result` type for exporter operations.
pub type OTelSdkResult = Result<(), OTelSdkError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn sentinel_is_distinguishable_from_transport_errors() {
        assert!(OTelSdkError::AlreadyShutdown.is_shutdown());
        assert!(!OTelSdkError::Timeout(Duration::from_secs(1)).is_shutdown());
        assert!(!OTelSdkError::Cancelled.is_shutdown());
        // Even a transport error whose message mentions shutdown is not the sentinel.
        let lookalike = OTelSdkError::InternalFailure("Shutdown already invoked".into());
        assert_ne!(lookalike, OTelSdkError::AlreadyShutdown);
        assert!(!lookalike.is_shutdown());
    }

    #[test]
    fn poisoned_mutex_maps_to_internal_failure() {
        let lock = std::sync::Arc::new(Mutex::new(0));
        let poisoner = lock.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        let err: OTelSdkError = lock.lock().unwrap_err().into();
        assert!(matches!(err, OTelSdkError::InternalFailure(_)));
    }
}

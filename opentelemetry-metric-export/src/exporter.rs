//! Interfaces for exporting metrics

use std::future::Future;

use crate::{context::ExportContext, data::ResourceMetrics, error::OTelSdkResult};

/// Exporter handles the delivery of metric data to external receivers.
///
/// This is the final component in the metric push pipeline:
///
/// ```text
/// aggregation snapshot → reader → PushMetricExporter::export → receiver
/// ```
///
/// # Lifecycle
///
/// An exporter starts active. [`shutdown`] moves it to the terminal shut down
/// state; from then on [`export`] performs no transmission and returns
/// [`OTelSdkError::AlreadyShutdown`]. Implementations track this with a
/// [`ShutdownLatch`].
///
/// # Deadlines
///
/// Every operation receives an [`ExportContext`]. Its deadline and
/// cancellation are a hard upper bound on how long the call blocks: when the
/// context fires the call returns an error promptly instead of finishing the
/// work. An exporter that ignores its context stalls the whole pipeline's
/// flush and shutdown.
///
/// # Concurrency
///
/// Calls are made synchronously by the pipeline. The contract makes no
/// promise that overlapping [`export`] calls are race free; a driver that
/// needs concurrent exports must serialize them or rely on an implementation
/// documenting otherwise. [`shutdown`] is always safe to call while other
/// calls are in flight.
///
/// [`export`]: PushMetricExporter::export
/// [`shutdown`]: PushMetricExporter::shutdown
/// [`OTelSdkError::AlreadyShutdown`]: crate::error::OTelSdkError::AlreadyShutdown
/// [`ShutdownLatch`]: crate::ShutdownLatch
pub trait PushMetricExporter: Send + Sync + 'static {
    /// Export serializes and transmits metric data to a receiver.
    ///
    /// The snapshot is borrowed for the duration of the call only; the
    /// caller may reuse its buffers once the returned future completes, so
    /// anything retained must be cloned.
    ///
    /// All retry logic must be contained in this function. The pipeline does
    /// not implement any retry logic. All errors returned by this function are
    /// considered unrecoverable and will be reported to the error handler.
    fn export(
        &self,
        ctx: &ExportContext,
        metrics: &ResourceMetrics,
    ) -> impl Future<Output = OTelSdkResult> + Send;

    /// Flushes any metric data held by an exporter.
    ///
    /// The deadline or cancellation of the passed context must be honored. An
    /// appropriate error should be returned in these situations.
    fn force_flush(&self, ctx: &ExportContext) -> impl Future<Output = OTelSdkResult> + Send;

    /// Flushes all metric data held by an exporter and releases any held
    /// computational resources.
    ///
    /// The deadline or cancellation of the passed context must be honored. An
    /// appropriate error should be returned in these situations, but the
    /// exporter is shut down afterwards regardless.
    ///
    /// After Shutdown is called, calls to Export will perform no operation and
    /// instead will return an error indicating the shutdown state. Calling
    /// Shutdown again returns that same error and does not repeat teardown.
    fn shutdown(&self, ctx: &ExportContext) -> impl Future<Output = OTelSdkResult> + Send;
}

use crate::context::ExportContext;
use crate::data::ResourceMetrics;
use crate::error::{OTelSdkError, OTelSdkResult};
use crate::exporter::PushMetricExporter;
use crate::latch::ShutdownLatch;
use futures_timer::Delay;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// An in-memory metrics exporter that stores metrics data in memory.
///
/// This exporter is useful for testing and debugging purposes. It stores a
/// deep copy of every exported snapshot in a `VecDeque<ResourceMetrics>`.
/// Metrics can be retrieved using the `get_finished_metrics` method.
///
/// Clones share their storage, so a clone kept by a test observes everything
/// exported through another clone handed to a pipeline.
///
/// # Example
///
/// ```
///# use std::time::Duration;
///# use opentelemetry_metric_export::{ExportContext, PushMetricExporter};
///# use opentelemetry_metric_export::InMemoryMetricExporter;
///# use opentelemetry_metric_export::data::ResourceMetrics;
///# futures_executor::block_on(async {
/// let exporter = InMemoryMetricExporter::default();
/// let ctx = ExportContext::with_timeout(Duration::from_secs(1));
///
/// exporter.export(&ctx, &ResourceMetrics::default()).await.unwrap();
///
/// let finished_metrics = exporter.get_finished_metrics().unwrap();
/// assert_eq!(finished_metrics.len(), 1);
///# });
/// ```
#[derive(Clone)]
pub struct InMemoryMetricExporter {
    inner: Arc<Inner>,
}

struct Inner {
    metrics: Mutex<VecDeque<ResourceMetrics>>,
    export_delay: Option<Duration>,
    export_count: AtomicUsize,
    release_count: AtomicUsize,
    latch: ShutdownLatch,
}

impl fmt::Debug for InMemoryMetricExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryMetricExporter")
            .field("export_delay", &self.inner.export_delay)
            .field("is_shutdown", &self.inner.latch.is_shutdown())
            .finish()
    }
}

impl Default for InMemoryMetricExporter {
    fn default() -> Self {
        InMemoryMetricExporterBuilder::new().build()
    }
}

/// Builder for [`InMemoryMetricExporter`].
/// # Example
///
/// ```
/// # use opentelemetry_metric_export::InMemoryMetricExporterBuilder;
///
/// let exporter = InMemoryMetricExporterBuilder::new().build();
/// ```
#[derive(Debug, Default)]
pub struct InMemoryMetricExporterBuilder {
    export_delay: Option<Duration>,
}

impl InMemoryMetricExporterBuilder {
    /// Creates a new instance of the `InMemoryMetricExporterBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a transmission taking `delay` on every export.
    ///
    /// The delay honors the export context, so a deadline shorter than the
    /// delay fails the export with [`OTelSdkError::Timeout`] and records
    /// nothing.
    pub fn with_export_delay(mut self, delay: Duration) -> Self {
        self.export_delay = Some(delay);
        self
    }

    /// Creates a new instance of the `InMemoryMetricExporter`.
    pub fn build(self) -> InMemoryMetricExporter {
        InMemoryMetricExporter {
            inner: Arc::new(Inner {
                metrics: Mutex::new(VecDeque::new()),
                export_delay: self.export_delay,
                export_count: AtomicUsize::new(0),
                release_count: AtomicUsize::new(0),
                latch: ShutdownLatch::new(),
            }),
        }
    }
}

impl InMemoryMetricExporter {
    /// Create a builder for an [`InMemoryMetricExporter`].
    pub fn builder() -> InMemoryMetricExporterBuilder {
        InMemoryMetricExporterBuilder::new()
    }

    /// Returns the finished metrics as a vector of `ResourceMetrics`.
    ///
    /// # Errors
    ///
    /// Returns an [`OTelSdkError::InternalFailure`] if the internal lock is
    /// poisoned.
    pub fn get_finished_metrics(&self) -> Result<Vec<ResourceMetrics>, OTelSdkError> {
        let metrics = self.inner.metrics.lock()?;
        Ok(metrics.iter().cloned().collect())
    }

    /// Number of snapshots recorded since creation or the last [`reset`].
    ///
    /// [`reset`]: InMemoryMetricExporter::reset
    pub fn export_count(&self) -> usize {
        self.inner.export_count.load(Ordering::SeqCst)
    }

    /// Number of times shutdown actually released resources. Never exceeds one.
    pub fn release_count(&self) -> usize {
        self.inner.release_count.load(Ordering::SeqCst)
    }

    /// Whether shutdown has been called.
    pub fn is_shutdown(&self) -> bool {
        self.inner.latch.is_shutdown()
    }

    /// Clears the internal storage of finished metrics and the export count.
    pub fn reset(&self) {
        if let Ok(mut metrics) = self.inner.metrics.lock() {
            metrics.clear();
            self.inner.export_count.store(0, Ordering::SeqCst);
        }
    }
}

impl PushMetricExporter for InMemoryMetricExporter {
    async fn export(&self, ctx: &ExportContext, metrics: &ResourceMetrics) -> OTelSdkResult {
        self.inner.latch.ensure_active()?;
        ctx.check()?;
        if let Some(delay) = self.inner.export_delay {
            ctx.run(async {
                Delay::new(delay).await;
                Ok(())
            })
            .await?;
        }
        // The caller owns `metrics` once this call returns; keep a deep copy.
        let mut recorded = self.inner.metrics.lock()?;
        recorded.push_back(metrics.clone());
        self.inner.export_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn force_flush(&self, ctx: &ExportContext) -> OTelSdkResult {
        self.inner.latch.ensure_active()?;
        ctx.check()
    }

    async fn shutdown(&self, _ctx: &ExportContext) -> OTelSdkResult {
        self.inner.latch.shut_down()?;
        self.inner.release_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::metrics::single_point_snapshot;
    use futures_executor::block_on;

    #[test]
    fn records_deep_copies() {
        let exporter = InMemoryMetricExporter::default();
        let ctx = ExportContext::with_timeout(Duration::from_secs(1));
        let mut snapshot = single_point_snapshot("requests", 7);

        block_on(exporter.export(&ctx, &snapshot)).unwrap();
        // Caller reuses its buffer after the call returned.
        snapshot.scope_metrics.clear();

        let finished = exporter.get_finished_metrics().unwrap();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0], single_point_snapshot("requests", 7));
        assert_eq!(exporter.export_count(), 1);
    }

    #[test]
    fn clones_share_storage() {
        let exporter = InMemoryMetricExporter::default();
        let handle = exporter.clone();
        let ctx = ExportContext::new();

        block_on(exporter.export(&ctx, &single_point_snapshot("a", 1))).unwrap();
        assert_eq!(handle.export_count(), 1);

        handle.reset();
        assert_eq!(exporter.export_count(), 0);
        assert!(exporter.get_finished_metrics().unwrap().is_empty());
    }

    #[test]
    fn delay_longer_than_deadline_times_out() {
        let exporter = InMemoryMetricExporter::builder()
            .with_export_delay(Duration::from_secs(10))
            .build();
        let ctx = ExportContext::with_timeout(Duration::from_millis(20));

        let result = block_on(exporter.export(&ctx, &single_point_snapshot("a", 1)));
        assert_eq!(result, Err(OTelSdkError::Timeout(Duration::from_millis(20))));
        assert_eq!(exporter.export_count(), 0);
    }

    #[test]
    fn idle_force_flush_records_nothing() {
        let exporter = InMemoryMetricExporter::default();
        let ctx = ExportContext::with_timeout(Duration::from_secs(1));

        assert!(block_on(exporter.force_flush(&ctx)).is_ok());
        assert_eq!(exporter.export_count(), 0);
        assert!(exporter.get_finished_metrics().unwrap().is_empty());
    }

    #[test]
    fn past_deadline_records_nothing() {
        let exporter = InMemoryMetricExporter::default();
        let expired =
            ExportContext::with_deadline(std::time::Instant::now() - Duration::from_millis(1));

        let result = block_on(exporter.export(&expired, &single_point_snapshot("a", 1)));
        assert!(matches!(result, Err(OTelSdkError::Timeout(_))));
        assert_eq!(exporter.export_count(), 0);
    }

    #[test]
    fn shutdown_releases_once() {
        let exporter = InMemoryMetricExporter::default();
        let ctx = ExportContext::new();

        assert!(block_on(exporter.shutdown(&ctx)).is_ok());
        assert_eq!(
            block_on(exporter.shutdown(&ctx)),
            Err(OTelSdkError::AlreadyShutdown)
        );
        assert_eq!(exporter.release_count(), 1);
        assert!(exporter.is_shutdown());
        assert_eq!(
            block_on(exporter.export(&ctx, &single_point_snapshot("a", 1))),
            Err(OTelSdkError::AlreadyShutdown)
        );
    }
}

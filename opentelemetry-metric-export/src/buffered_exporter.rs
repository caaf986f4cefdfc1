//! # Buffered Metric Exporter
//!
//! [`BufferedMetricExporter`] decouples the pipeline's export cadence from the
//! destination. Export deep-copies the snapshot into a bounded queue and
//! returns; queued snapshots are forwarded to the wrapped exporter when the
//! queue reaches `max_export_batch_size`, on [`force_flush`], and on
//! [`shutdown`].
//!
//! ```ascii
//!   +----------+   +---------------------------+   +------------------+
//!   | reader   +---> BufferedMetricExporter    +---> inner exporter   |
//!   +----------+   |   (bounded FIFO queue)    |   +------------------+
//!                  +---------------------------+
//! ```
//!
//! [`force_flush`]: crate::PushMetricExporter::force_flush
//! [`shutdown`]: crate::PushMetricExporter::shutdown
use std::collections::VecDeque;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use opentelemetry::{otel_debug, otel_warn};

use crate::{
    context::ExportContext,
    data::ResourceMetrics,
    error::{OTelSdkError, OTelSdkResult},
    exporter::PushMetricExporter,
    latch::ShutdownLatch,
};

/// Maximum number of snapshots held in the queue.
pub(crate) const OTEL_METRIC_EXPORT_MAX_QUEUE_SIZE: &str = "OTEL_METRIC_EXPORT_MAX_QUEUE_SIZE";
/// Default maximum queue size.
pub(crate) const OTEL_METRIC_EXPORT_MAX_QUEUE_SIZE_DEFAULT: usize = 64;
/// Queue length that triggers forwarding, must be less than or equal to
/// OTEL_METRIC_EXPORT_MAX_QUEUE_SIZE.
pub(crate) const OTEL_METRIC_EXPORT_MAX_BATCH_SIZE: &str = "OTEL_METRIC_EXPORT_MAX_BATCH_SIZE";
/// Default maximum batch size.
pub(crate) const OTEL_METRIC_EXPORT_MAX_BATCH_SIZE_DEFAULT: usize = 16;

/// Queue configuration for [`BufferedMetricExporter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    /// The maximum number of snapshots held. Exports beyond it are dropped.
    pub(crate) max_queue_size: usize,
    /// The queue length at which export forwards everything queued.
    pub(crate) max_export_batch_size: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        BufferConfigBuilder::default().build()
    }
}

impl BufferConfig {
    /// The maximum number of snapshots held.
    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    /// The queue length at which export forwards everything queued.
    pub fn max_export_batch_size(&self) -> usize {
        self.max_export_batch_size
    }
}

/// A builder for creating [`BufferConfig`] instances.
#[derive(Debug)]
pub struct BufferConfigBuilder {
    max_queue_size: usize,
    max_export_batch_size: usize,
}

impl Default for BufferConfigBuilder {
    /// Create a new [`BufferConfigBuilder`] initialized with default values,
    /// overridden by `OTEL_METRIC_EXPORT_MAX_QUEUE_SIZE` and
    /// `OTEL_METRIC_EXPORT_MAX_BATCH_SIZE` when set.
    fn default() -> Self {
        BufferConfigBuilder {
            max_queue_size: OTEL_METRIC_EXPORT_MAX_QUEUE_SIZE_DEFAULT,
            max_export_batch_size: OTEL_METRIC_EXPORT_MAX_BATCH_SIZE_DEFAULT,
        }
        .init_from_env_vars()
    }
}

impl BufferConfigBuilder {
    /// Set max_queue_size for [`BufferConfigBuilder`]. Zero is ignored.
    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        if max_queue_size > 0 {
            self.max_queue_size = max_queue_size;
        }
        self
    }

    /// Set max_export_batch_size for [`BufferConfigBuilder`]. Zero is
    /// ignored, values above the queue size are clamped to it.
    pub fn with_max_export_batch_size(mut self, max_export_batch_size: usize) -> Self {
        if max_export_batch_size > 0 {
            self.max_export_batch_size = max_export_batch_size;
        }
        self
    }

    /// Builds a [`BufferConfig`].
    pub fn build(self) -> BufferConfig {
        BufferConfig {
            max_queue_size: self.max_queue_size,
            max_export_batch_size: self.max_export_batch_size.min(self.max_queue_size),
        }
    }

    fn init_from_env_vars(mut self) -> Self {
        if let Some(max_queue_size) = env::var(OTEL_METRIC_EXPORT_MAX_QUEUE_SIZE)
            .ok()
            .and_then(|queue_size| usize::from_str(&queue_size).ok())
        {
            self = self.with_max_queue_size(max_queue_size);
        }

        if let Some(max_export_batch_size) = env::var(OTEL_METRIC_EXPORT_MAX_BATCH_SIZE)
            .ok()
            .and_then(|batch_size| usize::from_str(&batch_size).ok())
        {
            self = self.with_max_export_batch_size(max_export_batch_size);
        }

        self
    }
}

/// An exporter holding snapshots in memory until they are flushed to the
/// exporter it wraps.
///
/// Shutdown drains the queue into the inner exporter, then shuts the inner
/// exporter down. A second shutdown returns [`OTelSdkError::AlreadyShutdown`]
/// without touching the inner exporter again.
pub struct BufferedMetricExporter<E> {
    inner: E,
    queue: Mutex<VecDeque<ResourceMetrics>>,
    // Serializes drains so snapshots reach the inner exporter in FIFO order.
    drain_lock: tokio::sync::Mutex<()>,
    config: BufferConfig,
    latch: ShutdownLatch,
    dropped_count: AtomicUsize,
}

impl<E> fmt::Debug for BufferedMetricExporter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedMetricExporter")
            .field("config", &self.config)
            .field("is_shutdown", &self.latch.is_shutdown())
            .finish()
    }
}

impl<E> BufferedMetricExporter<E>
where
    E: PushMetricExporter,
{
    /// Wrap `inner` with the default [`BufferConfig`].
    pub fn new(inner: E) -> Self {
        Self::with_config(inner, BufferConfig::default())
    }

    /// Wrap `inner` with an explicit [`BufferConfig`].
    pub fn with_config(inner: E, config: BufferConfig) -> Self {
        BufferedMetricExporter {
            inner,
            queue: Mutex::new(VecDeque::with_capacity(config.max_queue_size)),
            drain_lock: tokio::sync::Mutex::new(()),
            config,
            latch: ShutdownLatch::new(),
            dropped_count: AtomicUsize::new(0),
        }
    }

    /// The wrapped exporter.
    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// The queue configuration.
    pub fn config(&self) -> BufferConfig {
        self.config
    }

    /// Number of snapshots waiting to be forwarded.
    ///
    /// # Errors
    ///
    /// Returns an [`OTelSdkError::InternalFailure`] if the queue lock is
    /// poisoned.
    pub fn pending(&self) -> Result<usize, OTelSdkError> {
        Ok(self.queue.lock()?.len())
    }

    /// Number of snapshots dropped because the queue was full.
    pub fn dropped(&self) -> usize {
        self.dropped_count.load(Ordering::Relaxed)
    }

    // Returns the queue length after the push.
    fn enqueue(&self, metrics: &ResourceMetrics) -> Result<usize, OTelSdkError> {
        let mut queue = self.queue.lock()?;
        // Checked under the queue lock: once shutdown has tripped the latch no
        // snapshot can slip into the queue behind its drain.
        self.latch.ensure_active()?;
        if queue.len() >= self.config.max_queue_size {
            if self.dropped_count.fetch_add(1, Ordering::Relaxed) == 0 {
                otel_warn!(
                    name: "BufferedMetricExporter.SnapshotDroppingStarted",
                    message = "BufferedMetricExporter dropped a snapshot due to queue full. No further warning will be emitted until Shutdown, which reports the total count."
                );
            }
            return Err(OTelSdkError::InternalFailure(format!(
                "export queue is full ({} snapshots), snapshot dropped",
                self.config.max_queue_size
            )));
        }
        queue.push_back(metrics.clone());
        Ok(queue.len())
    }

    fn dequeue(&self) -> Result<Option<ResourceMetrics>, OTelSdkError> {
        Ok(self.queue.lock()?.pop_front())
    }

    /// Forward every queued snapshot to the inner exporter, oldest first.
    ///
    /// Waiting for a drain already in progress counts against `ctx`.
    ///
    /// Stops at the first failure. The failing snapshot is discarded since
    /// export errors are unrecoverable; snapshots behind it stay queued.
    async fn drain(&self, ctx: &ExportContext) -> OTelSdkResult {
        let _draining = ctx.run(async { Ok(self.drain_lock.lock().await) }).await?;
        let mut forwarded = 0usize;
        loop {
            ctx.check()?;
            let Some(metrics) = self.dequeue()? else {
                break;
            };
            if let Err(err) = self.inner.export(ctx, &metrics).await {
                otel_debug!(
                    name: "BufferedMetricExporter.ForwardFailed",
                    forwarded = forwarded,
                    error = format!("{err}")
                );
                return Err(err);
            }
            forwarded += 1;
        }
        otel_debug!(name: "BufferedMetricExporter.Drained", forwarded = forwarded);
        Ok(())
    }
}

impl<E> PushMetricExporter for BufferedMetricExporter<E>
where
    E: PushMetricExporter,
{
    async fn export(&self, ctx: &ExportContext, metrics: &ResourceMetrics) -> OTelSdkResult {
        self.latch.ensure_active()?;
        ctx.check()?;
        let queued = self.enqueue(metrics)?;
        if queued >= self.config.max_export_batch_size {
            self.drain(ctx).await?;
        }
        Ok(())
    }

    async fn force_flush(&self, ctx: &ExportContext) -> OTelSdkResult {
        self.latch.ensure_active()?;
        self.drain(ctx).await
    }

    async fn shutdown(&self, ctx: &ExportContext) -> OTelSdkResult {
        self.latch.shut_down()?;

        // A drain that could not start in time still falls through to the
        // discard and the inner shutdown below.
        let drained = self.drain(ctx).await;
        let abandoned = self
            .queue
            .lock()
            .map(|mut queue| queue.drain(..).count())
            .unwrap_or(0);
        if abandoned > 0 {
            otel_warn!(
                name: "BufferedMetricExporter.Shutdown.SnapshotsAbandoned",
                abandoned_count = abandoned,
                message = "Snapshots still queued when shutdown could not forward them are discarded."
            );
        }
        let dropped = self.dropped_count.load(Ordering::Relaxed);
        if dropped > 0 {
            otel_warn!(
                name: "BufferedMetricExporter.SnapshotsDropped",
                dropped_count = dropped,
                max_queue_size = self.config.max_queue_size,
                message = "Snapshots were dropped due to the queue being full. The count represents the total dropped in the lifetime of this exporter."
            );
        }

        // The inner exporter is shut down even when draining failed so its
        // resources are released exactly once.
        let inner = self.inner.shutdown(ctx).await;
        drained.and(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory_exporter::InMemoryMetricExporter;
    use crate::testing::metrics::single_point_snapshot;
    use rstest::rstest;
    use std::sync::Arc;
    use std::time::Duration;

    fn buffered(
        queue: usize,
        batch: usize,
    ) -> (BufferedMetricExporter<InMemoryMetricExporter>, InMemoryMetricExporter) {
        let receiver = InMemoryMetricExporter::default();
        let config = BufferConfigBuilder::default()
            .with_max_queue_size(queue)
            .with_max_export_batch_size(batch)
            .build();
        (
            BufferedMetricExporter::with_config(receiver.clone(), config),
            receiver,
        )
    }

    #[test]
    fn batch_size_is_clamped_to_queue_size() {
        let config = BufferConfigBuilder::default()
            .with_max_queue_size(4)
            .with_max_export_batch_size(10)
            .build();
        assert_eq!(config.max_export_batch_size(), 4);
    }

    #[rstest]
    #[case(Some("8"), Some("3"), 8, 3)]
    #[case(Some("0"), Some("many"), OTEL_METRIC_EXPORT_MAX_QUEUE_SIZE_DEFAULT, OTEL_METRIC_EXPORT_MAX_BATCH_SIZE_DEFAULT)]
    #[case(Some("4"), None, 4, 4)]
    #[case(None, Some("0"), OTEL_METRIC_EXPORT_MAX_QUEUE_SIZE_DEFAULT, OTEL_METRIC_EXPORT_MAX_BATCH_SIZE_DEFAULT)]
    #[case(None, None, OTEL_METRIC_EXPORT_MAX_QUEUE_SIZE_DEFAULT, OTEL_METRIC_EXPORT_MAX_BATCH_SIZE_DEFAULT)]
    fn config_is_read_from_environment(
        #[case] queue_size: Option<&str>,
        #[case] batch_size: Option<&str>,
        #[case] expected_queue_size: usize,
        #[case] expected_batch_size: usize,
    ) {
        temp_env::with_vars(
            [
                (OTEL_METRIC_EXPORT_MAX_QUEUE_SIZE, queue_size),
                (OTEL_METRIC_EXPORT_MAX_BATCH_SIZE, batch_size),
            ],
            || {
                let config = BufferConfig::default();
                assert_eq!(config.max_queue_size(), expected_queue_size);
                assert_eq!(config.max_export_batch_size(), expected_batch_size);
            },
        );
    }

    #[tokio::test]
    async fn export_buffers_until_flush() {
        let (exporter, receiver) = buffered(8, 8);
        let ctx = ExportContext::with_timeout(Duration::from_secs(5));

        exporter.export(&ctx, &single_point_snapshot("a", 1)).await.unwrap();
        exporter.export(&ctx, &single_point_snapshot("b", 2)).await.unwrap();
        assert_eq!(exporter.pending().unwrap(), 2);
        assert_eq!(receiver.export_count(), 0);

        exporter.force_flush(&ctx).await.unwrap();
        assert_eq!(exporter.pending().unwrap(), 0);
        let forwarded = receiver.get_finished_metrics().unwrap();
        assert_eq!(forwarded.len(), 2);
        assert_eq!(forwarded[0], single_point_snapshot("a", 1));
        assert_eq!(forwarded[1], single_point_snapshot("b", 2));
    }

    #[tokio::test]
    async fn reaching_batch_size_forwards_queue() {
        let (exporter, receiver) = buffered(8, 2);
        let ctx = ExportContext::with_timeout(Duration::from_secs(5));

        exporter.export(&ctx, &single_point_snapshot("a", 1)).await.unwrap();
        assert_eq!(receiver.export_count(), 0);
        exporter.export(&ctx, &single_point_snapshot("b", 1)).await.unwrap();
        assert_eq!(receiver.export_count(), 2);
        assert_eq!(exporter.pending().unwrap(), 0);
    }

    // Blocks every forwarded export until the gate opens.
    struct GatedExporter {
        entered: tokio::sync::Notify,
        gate: tokio::sync::watch::Receiver<bool>,
        forwarded: AtomicUsize,
        shutdowns: AtomicUsize,
    }

    impl GatedExporter {
        fn new() -> (Arc<Self>, tokio::sync::watch::Sender<bool>) {
            let (open, gate) = tokio::sync::watch::channel(false);
            let inner = Arc::new(GatedExporter {
                entered: tokio::sync::Notify::new(),
                gate,
                forwarded: AtomicUsize::new(0),
                shutdowns: AtomicUsize::new(0),
            });
            (inner, open)
        }
    }

    impl PushMetricExporter for Arc<GatedExporter> {
        async fn export(&self, _ctx: &ExportContext, _metrics: &ResourceMetrics) -> OTelSdkResult {
            self.entered.notify_one();
            let mut gate = self.gate.clone();
            let _ = gate.wait_for(|open| *open).await;
            self.forwarded.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn force_flush(&self, _ctx: &ExportContext) -> OTelSdkResult {
            Ok(())
        }

        async fn shutdown(&self, _ctx: &ExportContext) -> OTelSdkResult {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn full_queue_drops_incoming_snapshot() {
        let (inner, open) = GatedExporter::new();
        let config = BufferConfigBuilder::default()
            .with_max_queue_size(2)
            .with_max_export_batch_size(2)
            .build();
        let exporter = Arc::new(BufferedMetricExporter::with_config(inner.clone(), config));
        let ctx = ExportContext::with_timeout(Duration::from_secs(5));

        // "a" and "b" fill the batch; the drain blocks forwarding "a".
        exporter.export(&ctx, &single_point_snapshot("a", 1)).await.unwrap();
        let first = {
            let exporter = exporter.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move { exporter.export(&ctx, &single_point_snapshot("b", 1)).await })
        };
        inner.entered.notified().await;

        // "c" is queued behind "b" and waits for the drain in progress.
        let second = {
            let exporter = exporter.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move { exporter.export(&ctx, &single_point_snapshot("c", 1)).await })
        };
        while exporter.pending().unwrap() < 2 {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            exporter.export(&ctx, &single_point_snapshot("d", 1)).await,
            Err(OTelSdkError::InternalFailure(_))
        ));
        assert_eq!(exporter.dropped(), 1);

        open.send_replace(true);
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();
        assert_eq!(inner.forwarded.load(Ordering::SeqCst), 3);
        assert_eq!(exporter.pending().unwrap(), 0);
    }

    // Starts a drain that stays blocked inside the inner exporter.
    async fn blocked_drain(
        inner: &Arc<GatedExporter>,
    ) -> (
        Arc<BufferedMetricExporter<Arc<GatedExporter>>>,
        tokio::task::JoinHandle<OTelSdkResult>,
    ) {
        let config = BufferConfigBuilder::default()
            .with_max_queue_size(4)
            .with_max_export_batch_size(1)
            .build();
        let exporter = Arc::new(BufferedMetricExporter::with_config(inner.clone(), config));
        let background = {
            let exporter = exporter.clone();
            tokio::spawn(async move {
                let ctx = ExportContext::with_timeout(Duration::from_secs(10));
                exporter.export(&ctx, &single_point_snapshot("a", 1)).await
            })
        };
        inner.entered.notified().await;
        (exporter, background)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn force_flush_waiting_on_drain_honors_deadline() {
        let (inner, open) = GatedExporter::new();
        let (exporter, background) = blocked_drain(&inner).await;

        let started = std::time::Instant::now();
        let result = exporter
            .force_flush(&ExportContext::with_timeout(Duration::from_millis(50)))
            .await;
        assert_eq!(result, Err(OTelSdkError::Timeout(Duration::from_millis(50))));
        assert!(started.elapsed() < Duration::from_secs(1));

        open.send_replace(true);
        background.await.unwrap().unwrap();
        assert_eq!(inner.forwarded.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn shutdown_waiting_on_drain_still_shuts_inner_down() {
        let (inner, open) = GatedExporter::new();
        let (exporter, background) = blocked_drain(&inner).await;

        let started = std::time::Instant::now();
        let result = exporter
            .shutdown(&ExportContext::with_timeout(Duration::from_millis(50)))
            .await;
        assert_eq!(result, Err(OTelSdkError::Timeout(Duration::from_millis(50))));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(inner.shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(
            exporter
                .shutdown(&ExportContext::with_timeout(Duration::from_secs(1)))
                .await,
            Err(OTelSdkError::AlreadyShutdown)
        );

        open.send_replace(true);
        background.await.unwrap().unwrap();
        assert_eq!(inner.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn idle_force_flush_transmits_nothing() {
        let (exporter, receiver) = buffered(8, 8);
        let ctx = ExportContext::with_timeout(Duration::from_secs(5));

        exporter.force_flush(&ctx).await.unwrap();
        exporter.force_flush(&ctx).await.unwrap();
        assert_eq!(receiver.export_count(), 0);
    }

    #[tokio::test]
    async fn export_past_deadline_queues_nothing() {
        let (exporter, receiver) = buffered(8, 1);
        let expired = ExportContext::with_deadline(
            std::time::Instant::now() - Duration::from_millis(1),
        );

        assert!(matches!(
            exporter.export(&expired, &single_point_snapshot("a", 1)).await,
            Err(OTelSdkError::Timeout(_))
        ));
        assert_eq!(exporter.pending().unwrap(), 0);
        exporter
            .force_flush(&ExportContext::with_timeout(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(receiver.export_count(), 0);
    }

    #[test]
    fn poisoned_queue_is_reported() {
        let (exporter, _receiver) = buffered(8, 8);
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _queue = exporter.queue.lock().unwrap();
            panic!("poison the queue lock");
        }));

        assert!(matches!(
            exporter.pending(),
            Err(OTelSdkError::InternalFailure(_))
        ));
    }

    #[tokio::test]
    async fn shutdown_flushes_buffered_snapshots_then_rejects_exports() {
        let (exporter, receiver) = buffered(8, 8);
        let ctx = ExportContext::with_timeout(Duration::from_secs(5));

        exporter.export(&ctx, &single_point_snapshot("a", 1)).await.unwrap();
        exporter.export(&ctx, &single_point_snapshot("b", 2)).await.unwrap();
        assert_eq!(receiver.export_count(), 0);

        exporter.shutdown(&ctx).await.unwrap();
        assert_eq!(receiver.export_count(), 2);
        assert_eq!(receiver.release_count(), 1);

        assert_eq!(
            exporter.export(&ctx, &single_point_snapshot("c", 3)).await,
            Err(OTelSdkError::AlreadyShutdown)
        );
        assert_eq!(receiver.export_count(), 2);
        assert_eq!(exporter.pending().unwrap(), 0);
    }

    #[tokio::test]
    async fn shutdown_on_expired_context_still_shuts_down() {
        let (exporter, receiver) = buffered(8, 8);
        let ctx = ExportContext::with_timeout(Duration::from_secs(5));
        exporter.export(&ctx, &single_point_snapshot("a", 1)).await.unwrap();

        let expired = ExportContext::with_timeout(Duration::ZERO);
        assert!(matches!(
            exporter.shutdown(&expired).await,
            Err(OTelSdkError::Timeout(_))
        ));
        assert_eq!(receiver.export_count(), 0);
        assert_eq!(exporter.pending().unwrap(), 0);
        assert_eq!(receiver.release_count(), 1);
        assert_eq!(
            exporter.export(&ctx, &single_point_snapshot("b", 1)).await,
            Err(OTelSdkError::AlreadyShutdown)
        );
        assert_eq!(
            exporter.shutdown(&ctx).await,
            Err(OTelSdkError::AlreadyShutdown)
        );
        assert_eq!(receiver.release_count(), 1);
    }
}

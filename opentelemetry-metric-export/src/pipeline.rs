use std::{env, fmt, time::Duration};

use opentelemetry::otel_debug;
use tokio::sync::{Mutex, MutexGuard};

use crate::{
    context::ExportContext,
    data::ResourceMetrics,
    error::{OTelSdkError, OTelSdkResult},
    error_handler::handle_error,
    exporter::PushMetricExporter,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const METRIC_EXPORT_TIMEOUT_NAME: &str = "OTEL_METRIC_EXPORT_TIMEOUT";

/// Configuration options for [ExportPipeline].
///
/// The timeout bounds every call the pipeline makes into its exporter. It is
/// read from the `OTEL_METRIC_EXPORT_TIMEOUT` environment variable
/// (milliseconds) and defaults to 30 seconds.
#[derive(Debug)]
pub struct ExportPipelineBuilder<E> {
    timeout: Duration,
    exporter: E,
}

impl<E> ExportPipelineBuilder<E>
where
    E: PushMetricExporter,
{
    fn new(exporter: E) -> Self {
        let timeout = env::var(METRIC_EXPORT_TIMEOUT_NAME)
            .ok()
            .and_then(|v| v.parse().map(Duration::from_millis).ok())
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(DEFAULT_TIMEOUT);

        ExportPipelineBuilder { timeout, exporter }
    }

    /// Configures the time budget given to each exporter call.
    ///
    /// This option overrides any value set for the `OTEL_METRIC_EXPORT_TIMEOUT`
    /// environment variable.
    ///
    /// If this option is not used or `timeout` is equal to zero, 30 seconds is used
    /// as the default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.timeout = timeout;
        }
        self
    }

    /// Create an [ExportPipeline] with the given config.
    pub fn build(self) -> ExportPipeline<E> {
        ExportPipeline {
            exporter: self.exporter,
            timeout: self.timeout,
            call_lock: Mutex::new(()),
        }
    }
}

/// Drives a [PushMetricExporter] the way a reader does.
///
/// The exporter contract does not promise that overlapping exports are safe,
/// so the pipeline serializes its own `export` and `force_flush` calls.
/// `shutdown` is not serialized and may run while an export is in flight.
///
/// Each call gets a fresh [ExportContext] bounded by the configured timeout.
/// Every error the exporter returns is forwarded, unmodified, to the global
/// error handler and then returned to the caller. Nothing is retried.
pub struct ExportPipeline<E> {
    exporter: E,
    timeout: Duration,
    call_lock: Mutex<()>,
}

impl<E> fmt::Debug for ExportPipeline<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportPipeline")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<E> ExportPipeline<E>
where
    E: PushMetricExporter,
{
    /// Create a builder for an [ExportPipeline] wrapping `exporter`.
    pub fn builder(exporter: E) -> ExportPipelineBuilder<E> {
        ExportPipelineBuilder::new(exporter)
    }

    /// The wrapped exporter.
    pub fn exporter(&self) -> &E {
        &self.exporter
    }

    /// The time budget of each exporter call.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Export one snapshot under the configured timeout.
    pub async fn export(&self, metrics: &ResourceMetrics) -> OTelSdkResult {
        let ctx = ExportContext::with_timeout(self.timeout);
        self.export_with_context(&ctx, metrics).await
    }

    /// Export one snapshot under the earlier of `ctx` and the configured timeout.
    pub async fn export_with_context(
        &self,
        ctx: &ExportContext,
        metrics: &ResourceMetrics,
    ) -> OTelSdkResult {
        let ctx = ctx.child_with_timeout(self.timeout);
        let result = match self.serialize_under(&ctx).await {
            Ok(_serialized) => self.exporter.export(&ctx, metrics).await,
            Err(err) => Err(err),
        };
        report(result)
    }

    /// Ask the exporter to flush anything it holds.
    pub async fn force_flush(&self) -> OTelSdkResult {
        let ctx = ExportContext::with_timeout(self.timeout);
        let result = match self.serialize_under(&ctx).await {
            Ok(_serialized) => self.exporter.force_flush(&ctx).await,
            Err(err) => Err(err),
        };
        report(result)
    }

    /// Shut the exporter down.
    pub async fn shutdown(&self) -> OTelSdkResult {
        otel_debug!(
            name: "ExportPipeline.Shutdown",
            timeout_in_millisecs = self.timeout.as_millis()
        );
        let ctx = ExportContext::with_timeout(self.timeout);
        let result = self.exporter.shutdown(&ctx).await;
        report(result)
    }
}

impl<E> ExportPipeline<E> {
    // Waiting for the call in flight counts against `ctx`.
    async fn serialize_under(
        &self,
        ctx: &ExportContext,
    ) -> Result<MutexGuard<'_, ()>, OTelSdkError> {
        ctx.run(async { Ok(self.call_lock.lock().await) }).await
    }
}

fn report(result: OTelSdkResult) -> OTelSdkResult {
    if let Err(err) = &result {
        handle_error(err.clone());
    }
    result
}

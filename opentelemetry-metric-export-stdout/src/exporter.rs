use core::fmt;
use std::fs::OpenOptions;
use std::io::{self, stdout, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use opentelemetry::otel_debug;
use opentelemetry_metric_export::data::ResourceMetrics;
use opentelemetry_metric_export::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_metric_export::transform::MetricsData;
use opentelemetry_metric_export::{ExportContext, PushMetricExporter, ShutdownLatch};

use crate::text;

/// How snapshots are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum Encoding {
    /// Indented human readable text with formatted timestamps.
    #[default]
    Text,
    /// One OTLP/JSON shaped document per line.
    Json,
}

/// A [`PushMetricExporter`] that writes every snapshot to a writer, stdout by
/// default.
///
/// Each snapshot is encoded into a buffer first and written with a single
/// `write_all`, so concurrent exports never interleave their output.
/// Shutdown releases the writer; nothing is written afterwards.
pub struct MetricExporter {
    writer: Mutex<Option<Box<dyn Write + Send>>>,
    encoding: Encoding,
    latch: ShutdownLatch,
}

impl MetricExporter {
    /// Create a builder to configure this exporter.
    pub fn builder() -> MetricExporterBuilder {
        MetricExporterBuilder::default()
    }

    /// An exporter appending text encoded snapshots to the file at `path`,
    /// creating it when missing.
    pub fn to_file(path: impl AsRef<Path>) -> io::Result<MetricExporter> {
        Ok(MetricExporter::builder().with_file(path)?.build())
    }

    fn encode(&self, metrics: &ResourceMetrics) -> Result<Vec<u8>, OTelSdkError> {
        let mut buf = Vec::new();
        match self.encoding {
            Encoding::Text => text::write_metrics(&mut buf, metrics)
                .map_err(|err| OTelSdkError::InternalFailure(err.to_string()))?,
            Encoding::Json => {
                serde_json::to_writer(&mut buf, &MetricsData::from(metrics))
                    .map_err(|err| OTelSdkError::InternalFailure(err.to_string()))?;
                buf.push(b'\n');
            }
        }
        Ok(buf)
    }
}

impl Default for MetricExporter {
    fn default() -> Self {
        MetricExporterBuilder::default().build()
    }
}

impl fmt::Debug for MetricExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricExporter")
            .field("encoding", &self.encoding)
            .field("is_shutdown", &self.latch.is_shutdown())
            .finish()
    }
}

impl PushMetricExporter for MetricExporter {
    async fn export(&self, ctx: &ExportContext, metrics: &ResourceMetrics) -> OTelSdkResult {
        self.latch.ensure_active()?;
        ctx.check()?;
        let encoded = self.encode(metrics)?;
        ctx.check()?;

        let mut writer = self.writer.lock()?;
        match writer.as_mut() {
            Some(writer) => writer
                .write_all(&encoded)
                .map_err(|err| OTelSdkError::InternalFailure(err.to_string())),
            None => Err(OTelSdkError::AlreadyShutdown),
        }
    }

    async fn force_flush(&self, ctx: &ExportContext) -> OTelSdkResult {
        self.latch.ensure_active()?;
        ctx.check()?;
        let mut writer = self.writer.lock()?;
        match writer.as_mut() {
            Some(writer) => writer
                .flush()
                .map_err(|err| OTelSdkError::InternalFailure(err.to_string())),
            None => Err(OTelSdkError::AlreadyShutdown),
        }
    }

    async fn shutdown(&self, ctx: &ExportContext) -> OTelSdkResult {
        self.latch.shut_down()?;
        let writer = self.writer.lock()?.take();
        otel_debug!(name: "StdoutMetricExporter.Shutdown", encoding = format!("{:?}", self.encoding));

        match writer {
            // An expired context skips the final flush; the writer is dropped either way.
            Some(mut writer) => {
                ctx.check()?;
                writer
                    .flush()
                    .map_err(|err| OTelSdkError::InternalFailure(err.to_string()))
            }
            None => Ok(()),
        }
    }
}

/// Configuration for the stdout metrics exporter
#[derive(Default)]
pub struct MetricExporterBuilder {
    writer: Option<Box<dyn Write + Send>>,
    encoding: Encoding,
}

impl MetricExporterBuilder {
    /// Set the writer that the exporter will write to
    ///
    /// # Examples
    ///
    /// ```
    /// use opentelemetry_metric_export_stdout::MetricExporterBuilder;
    ///
    /// let buffer = Vec::new(); // Any type that implements `Write`
    /// let exporter = MetricExporterBuilder::default().with_writer(buffer).build();
    /// ```
    pub fn with_writer(mut self, writer: impl Write + Send + 'static) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }

    /// Write to the file at `path` through a buffer, appending to existing
    /// content and creating the file when missing.
    pub fn with_file(self, path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(self.with_writer(BufWriter::new(file)))
    }

    /// Set the [`Encoding`] used for every snapshot.
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Create a metrics exporter with the current configuration
    pub fn build(self) -> MetricExporter {
        MetricExporter {
            writer: Mutex::new(Some(self.writer.unwrap_or_else(|| Box::new(stdout())))),
            encoding: self.encoding,
            latch: ShutdownLatch::new(),
        }
    }
}

impl fmt::Debug for MetricExporterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricExporterBuilder")
            .field("encoding", &self.encoding)
            .finish()
    }
}

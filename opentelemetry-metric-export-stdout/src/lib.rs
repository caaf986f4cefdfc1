//! Export metric snapshots to stdout, a file or any [`std::io::Write`].
//!
//! The exporter is meant for debugging and learning. Two encodings are
//! available: a human readable [`Encoding::Text`] (the default) and
//! [`Encoding::Json`], which writes one OTLP/JSON shaped document per line.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use opentelemetry_metric_export::{ExportContext, PushMetricExporter};
//! use opentelemetry_metric_export::data::ResourceMetrics;
//! use opentelemetry_metric_export_stdout::{Encoding, MetricExporter};
//!
//! # futures_executor::block_on(async {
//! let exporter = MetricExporter::builder()
//!     .with_writer(std::io::sink())
//!     .with_encoding(Encoding::Json)
//!     .build();
//!
//! let ctx = ExportContext::with_timeout(Duration::from_secs(1));
//! exporter.export(&ctx, &ResourceMetrics::default()).await.unwrap();
//! exporter.shutdown(&ctx).await.unwrap();
//! # });
//! ```
#![warn(missing_debug_implementations, missing_docs)]

mod exporter;
mod text;

pub use exporter::{Encoding, MetricExporter, MetricExporterBuilder};

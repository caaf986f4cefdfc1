//! Export metric snapshots to an OTLP/HTTP collector as JSON.
//!
//! [`MetricExporter`] implements
//! [`PushMetricExporter`](opentelemetry_metric_export::PushMetricExporter).
//! Each export serializes the snapshot once and POSTs it to the configured
//! endpoint, retrying throttled (`429`), server (`5xx`) and connection
//! failures with exponential backoff until the export's deadline.
//!
//! Requests go through the [`HttpClient`] trait so any HTTP stack can be
//! plugged in; with the default `reqwest-client` feature a
//! [`reqwest::Client`](https://docs.rs/reqwest) is used when none is given.
//!
//! # Configuration
//!
//! | Environment variable                  | Default                            |
//! |---------------------------------------|------------------------------------|
//! | `OTEL_EXPORTER_OTLP_METRICS_ENDPOINT` | `http://localhost:4318/v1/metrics` |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT`         | (appends `/v1/metrics`)            |
//! | `OTEL_EXPORTER_OTLP_METRICS_TIMEOUT`  | `10000` (milliseconds)             |
//! | `OTEL_EXPORTER_OTLP_TIMEOUT`          |                                    |
//! | `OTEL_EXPORTER_OTLP_METRICS_HEADERS`  | (`key1=value1,key2=value2`)        |
//! | `OTEL_EXPORTER_OTLP_HEADERS`          |                                    |
//!
//! Values passed to [`MetricExporterBuilder`] take precedence.
//!
//! ```no_run
//! # #[cfg(feature = "reqwest-client")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::time::Duration;
//! use opentelemetry_metric_export::ExportPipeline;
//! use opentelemetry_metric_export_http::MetricExporter;
//!
//! let exporter = MetricExporter::builder()
//!     .with_endpoint("http://collector:4318/v1/metrics")
//!     .with_timeout(Duration::from_secs(5))
//!     .build()?;
//! let pipeline = ExportPipeline::builder(exporter).build();
//! # let _ = pipeline;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "reqwest-client"))]
//! # fn main() {}
//! ```
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod client;
mod config;
mod error;
mod exporter;
mod retry;

pub use client::{Bytes, HttpClient, HttpError, Request, Response};
pub use config::{
    OTEL_EXPORTER_OTLP_ENDPOINT, OTEL_EXPORTER_OTLP_HEADERS, OTEL_EXPORTER_OTLP_METRICS_ENDPOINT,
    OTEL_EXPORTER_OTLP_METRICS_ENDPOINT_DEFAULT, OTEL_EXPORTER_OTLP_METRICS_HEADERS,
    OTEL_EXPORTER_OTLP_METRICS_TIMEOUT, OTEL_EXPORTER_OTLP_TIMEOUT,
    OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT,
};
pub use error::ExporterBuildError;
pub use exporter::{MetricExporter, MetricExporterBuilder};
pub use retry::{classify_http_error, RetryErrorType, RetryPolicy};

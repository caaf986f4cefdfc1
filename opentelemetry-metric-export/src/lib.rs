//! # OpenTelemetry Metric Export
//!
//! The contract between a metrics pipeline and the components that deliver
//! its output to a receiver.
//!
//! A [`PushMetricExporter`] receives finished snapshots of aggregated metric
//! data ([`data::ResourceMetrics`]) and transmits them. Every call carries an
//! [`ExportContext`] whose deadline and cancellation bound how long the call
//! may block. Shutdown is a one-way transition tracked by a
//! [`ShutdownLatch`]; after it, every operation returns
//! [`OTelSdkError::AlreadyShutdown`](error::OTelSdkError::AlreadyShutdown).
//!
//! This crate provides:
//!
//! * the exporter trait and the types flowing through it,
//! * [`ExportPipeline`], which drives an exporter the way a periodic reader
//!   does: one call at a time, bounded by a timeout, errors forwarded to
//!   [`handle_error`],
//! * [`BufferedMetricExporter`], which queues snapshots in memory and
//!   forwards them to another exporter on flush or shutdown,
//! * with the `testing` feature, an [`InMemoryMetricExporter`] and the
//!   [`testing::conformance`] checks every exporter must pass,
//! * with the `serialize` feature, an OTLP/JSON shaped serde model in
//!   [`transform`].
//!
//! ## Example
//!
//! ```
//! # #[cfg(feature = "testing")]
//! # {
//! use std::time::Duration;
//! use opentelemetry_metric_export::{ExportPipeline, InMemoryMetricExporter};
//! use opentelemetry_metric_export::data::ResourceMetrics;
//!
//! # futures_executor::block_on(async {
//! let exporter = InMemoryMetricExporter::default();
//! let pipeline = ExportPipeline::builder(exporter.clone())
//!     .with_timeout(Duration::from_secs(5))
//!     .build();
//!
//! pipeline.export(&ResourceMetrics::default()).await.unwrap();
//! pipeline.shutdown().await.unwrap();
//! assert!(pipeline.export(&ResourceMetrics::default()).await.is_err());
//! assert_eq!(exporter.export_count(), 1);
//! # });
//! # }
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
#![doc(
    html_logo_url = "https://raw.githubusercontent.com/open-telemetry/opentelemetry-rust/main/assets/logo.svg"
)]

mod buffered_exporter;
mod context;
pub mod data;
pub mod error;
mod error_handler;
mod exporter;
#[cfg(any(feature = "testing", test))]
mod in_memory_exporter;
mod latch;
mod pipeline;
pub mod resource;
#[cfg(any(feature = "testing", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "testing")))]
pub mod testing;
#[cfg(feature = "serialize")]
#[cfg_attr(docsrs, doc(cfg(feature = "serialize")))]
pub mod transform;

pub use buffered_exporter::{BufferConfig, BufferConfigBuilder, BufferedMetricExporter};
pub use context::{CancelHandle, ExportContext};
pub use error_handler::{handle_error, set_error_handler};
pub use exporter::PushMetricExporter;
#[cfg(any(feature = "testing", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "testing")))]
pub use in_memory_exporter::{InMemoryMetricExporter, InMemoryMetricExporterBuilder};
pub use latch::ShutdownLatch;
pub use pipeline::{ExportPipeline, ExportPipelineBuilder};
pub use resource::{Resource, ResourceBuilder};

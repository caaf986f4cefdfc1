//! Lifecycle checks shared by every [`PushMetricExporter`] implementation.
//!
//! Each check takes ownership of a freshly built exporter, drives it through
//! one scenario and panics with a descriptive message when the exporter
//! breaks the contract. Run them from an exporter crate's tests:
//!
//! ```
//! # use opentelemetry_metric_export::InMemoryMetricExporter;
//! use opentelemetry_metric_export::testing::conformance;
//!
//! # futures_executor::block_on(async {
//! conformance::export_after_shutdown_is_rejected(InMemoryMetricExporter::default()).await;
//! conformance::repeated_shutdown_is_rejected(InMemoryMetricExporter::default()).await;
//! # });
//! ```
//!
//! [`PushMetricExporter`]: crate::PushMetricExporter
use std::time::{Duration, Instant};

use crate::context::ExportContext;
use crate::error::OTelSdkError;
use crate::exporter::PushMetricExporter;
use crate::testing::metrics::single_point_snapshot;

fn live_context() -> ExportContext {
    ExportContext::with_timeout(Duration::from_secs(10))
}

/// After a successful shutdown, export performs no transmission and returns
/// [`OTelSdkError::AlreadyShutdown`].
pub async fn export_after_shutdown_is_rejected<E: PushMetricExporter>(exporter: E) {
    let ctx = live_context();
    let snapshot = single_point_snapshot("after.shutdown", 1);

    exporter
        .shutdown(&ctx)
        .await
        .unwrap_or_else(|err| panic!("first shutdown failed: {err}"));
    let result = exporter.export(&ctx, &snapshot).await;
    assert_eq!(
        result,
        Err(OTelSdkError::AlreadyShutdown),
        "export after shutdown must return the shutdown sentinel"
    );
}

/// A second shutdown returns [`OTelSdkError::AlreadyShutdown`].
pub async fn repeated_shutdown_is_rejected<E: PushMetricExporter>(exporter: E) {
    let ctx = live_context();

    exporter
        .shutdown(&ctx)
        .await
        .unwrap_or_else(|err| panic!("first shutdown failed: {err}"));
    assert_eq!(
        exporter.shutdown(&ctx).await,
        Err(OTelSdkError::AlreadyShutdown),
        "second shutdown must return the shutdown sentinel"
    );
}

/// Force flush after shutdown returns [`OTelSdkError::AlreadyShutdown`].
pub async fn force_flush_after_shutdown_is_rejected<E: PushMetricExporter>(exporter: E) {
    let ctx = live_context();

    exporter
        .shutdown(&ctx)
        .await
        .unwrap_or_else(|err| panic!("first shutdown failed: {err}"));
    assert_eq!(
        exporter.force_flush(&ctx).await,
        Err(OTelSdkError::AlreadyShutdown),
        "force flush after shutdown must return the shutdown sentinel"
    );
}

/// Force flush on an exporter that never exported succeeds, and the exporter
/// still shuts down cleanly afterwards.
pub async fn force_flush_when_idle_succeeds<E: PushMetricExporter>(exporter: E) {
    let ctx = live_context();

    exporter
        .force_flush(&ctx)
        .await
        .unwrap_or_else(|err| panic!("force flush on an idle exporter failed: {err}"));
    exporter
        .shutdown(&ctx)
        .await
        .unwrap_or_else(|err| panic!("shutdown after an idle force flush failed: {err}"));
}

/// Export under a context whose deadline already passed fails with
/// [`OTelSdkError::Timeout`] and leaves the exporter usable.
pub async fn expired_context_is_rejected<E: PushMetricExporter>(exporter: E) {
    let expired = ExportContext::with_deadline(Instant::now() - Duration::from_millis(1));
    let snapshot = single_point_snapshot("expired", 1);

    let result = exporter.export(&expired, &snapshot).await;
    assert!(
        matches!(result, Err(OTelSdkError::Timeout(_))),
        "export under an expired context must time out, got {result:?}"
    );
    exporter
        .shutdown(&live_context())
        .await
        .unwrap_or_else(|err| panic!("shutdown after a timed out export failed: {err}"));
}

/// Export under a cancelled context fails with [`OTelSdkError::Cancelled`]
/// and leaves the exporter usable.
pub async fn cancelled_context_is_rejected<E: PushMetricExporter>(exporter: E) {
    let (cancelled, handle) = live_context().cancellable();
    handle.cancel();
    let snapshot = single_point_snapshot("cancelled", 1);

    let result = exporter.export(&cancelled, &snapshot).await;
    assert_eq!(
        result,
        Err(OTelSdkError::Cancelled),
        "export under a cancelled context must report cancellation"
    );
    exporter
        .shutdown(&live_context())
        .await
        .unwrap_or_else(|err| panic!("shutdown after a cancelled export failed: {err}"));
}

/// Run every check, each against a fresh exporter from `make_exporter`.
pub async fn run_all<E, F>(make_exporter: F)
where
    E: PushMetricExporter,
    F: Fn() -> E,
{
    export_after_shutdown_is_rejected(make_exporter()).await;
    repeated_shutdown_is_rejected(make_exporter()).await;
    force_flush_after_shutdown_is_rejected(make_exporter()).await;
    force_flush_when_idle_succeeds(make_exporter()).await;
    expired_context_is_rejected(make_exporter()).await;
    cancelled_context_is_rejected(make_exporter()).await;
}

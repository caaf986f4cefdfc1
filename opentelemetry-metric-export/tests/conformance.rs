use std::time::Duration;

use opentelemetry_metric_export::testing::conformance;
use opentelemetry_metric_export::{
    BufferConfigBuilder, BufferedMetricExporter, InMemoryMetricExporter,
};

#[tokio::test]
async fn in_memory_exporter_conforms() {
    conformance::run_all(InMemoryMetricExporter::default).await;
}

#[tokio::test]
async fn delayed_in_memory_exporter_conforms() {
    conformance::run_all(|| {
        InMemoryMetricExporter::builder()
            .with_export_delay(Duration::from_millis(5))
            .build()
    })
    .await;
}

#[tokio::test]
async fn buffered_exporter_conforms() {
    conformance::run_all(|| BufferedMetricExporter::new(InMemoryMetricExporter::default())).await;
}

#[tokio::test]
async fn buffered_exporter_with_small_batches_conforms() {
    conformance::run_all(|| {
        let config = BufferConfigBuilder::default()
            .with_max_queue_size(2)
            .with_max_export_batch_size(1)
            .build();
        BufferedMetricExporter::with_config(InMemoryMetricExporter::default(), config)
    })
    .await;
}

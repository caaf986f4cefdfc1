use opentelemetry_metric_export::testing::conformance;
use opentelemetry_metric_export::BufferedMetricExporter;
use opentelemetry_metric_export_stdout::{Encoding, MetricExporter};

fn sink_exporter(encoding: Encoding) -> MetricExporter {
    MetricExporter::builder()
        .with_writer(std::io::sink())
        .with_encoding(encoding)
        .build()
}

#[tokio::test]
async fn text_exporter_conforms() {
    conformance::run_all(|| sink_exporter(Encoding::Text)).await;
}

#[tokio::test]
async fn json_exporter_conforms() {
    conformance::run_all(|| sink_exporter(Encoding::Json)).await;
}

#[tokio::test]
async fn buffered_stdout_exporter_conforms() {
    conformance::run_all(|| BufferedMetricExporter::new(sink_exporter(Encoding::Json))).await;
}

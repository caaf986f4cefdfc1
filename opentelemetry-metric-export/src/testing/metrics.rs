//! Deterministic [`ResourceMetrics`] snapshots.
//!
//! Timestamps are fixed offsets from the Unix epoch so two snapshots built
//! with the same arguments compare equal.
use std::time::{Duration, SystemTime};

use opentelemetry::{InstrumentationScope, KeyValue};

use crate::data::{
    AggregatedMetrics, Exemplar, Gauge, GaugeDataPoint, Histogram, HistogramDataPoint, Metric,
    MetricData, ResourceMetrics, ScopeMetrics, Sum, SumDataPoint, Temporality,
};
use crate::Resource;

/// Start of every time series built here.
pub fn start_time() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

/// Collection time of every time series built here.
pub fn collection_time() -> SystemTime {
    start_time() + Duration::from_secs(60)
}

fn resource() -> Resource {
    Resource::builder()
        .with_service_name("metric-export-test")
        .build()
}

fn scope() -> InstrumentationScope {
    InstrumentationScope::builder("metric-export-test")
        .with_version("0.1.0")
        .build()
}

fn wrap(metrics: Vec<Metric>) -> ResourceMetrics {
    ResourceMetrics {
        resource: resource(),
        scope_metrics: vec![ScopeMetrics {
            scope: scope(),
            metrics,
        }],
    }
}

fn counter(name: &'static str, values: impl IntoIterator<Item = u64>) -> Metric {
    Metric {
        name: name.into(),
        description: "A test counter".into(),
        unit: "1".into(),
        data: AggregatedMetrics::U64(MetricData::Sum(Sum {
            data_points: values
                .into_iter()
                .enumerate()
                .map(|(i, value)| SumDataPoint {
                    attributes: vec![KeyValue::new("series", i as i64)],
                    value,
                    exemplars: vec![],
                })
                .collect(),
            start_time: start_time(),
            time: collection_time(),
            temporality: Temporality::Cumulative,
            is_monotonic: true,
        })),
    }
}

/// A snapshot with one monotonic `u64` sum named `name` holding one point.
pub fn single_point_snapshot(name: &'static str, value: u64) -> ResourceMetrics {
    wrap(vec![counter(name, [value])])
}

/// A snapshot with one monotonic `u64` sum holding `points` data points,
/// each in its own series.
pub fn snapshot_with_points(points: usize) -> ResourceMetrics {
    wrap(vec![counter("requests", (0..points).map(|i| i as u64 + 1))])
}

/// A snapshot exercising every aggregation and value type: an `f64` gauge,
/// an `i64` delta sum and a `u64` histogram carrying an exemplar.
pub fn mixed_snapshot() -> ResourceMetrics {
    let gauge = Metric {
        name: "temperature".into(),
        description: "Current temperature".into(),
        unit: "Cel".into(),
        data: AggregatedMetrics::F64(MetricData::Gauge(Gauge {
            data_points: vec![GaugeDataPoint {
                attributes: vec![KeyValue::new("room", "kitchen")],
                value: 21.5,
                exemplars: vec![],
            }],
            start_time: None,
            time: collection_time(),
        })),
    };
    let updown = Metric {
        name: "queue.depth".into(),
        description: "".into(),
        unit: "{item}".into(),
        data: AggregatedMetrics::I64(MetricData::Sum(Sum {
            data_points: vec![SumDataPoint {
                attributes: vec![],
                value: -3,
                exemplars: vec![],
            }],
            start_time: start_time(),
            time: collection_time(),
            temporality: Temporality::Delta,
            is_monotonic: false,
        })),
    };
    let histogram = Metric {
        name: "request.duration".into(),
        description: "Request latency".into(),
        unit: "ms".into(),
        data: AggregatedMetrics::U64(MetricData::Histogram(Histogram {
            data_points: vec![HistogramDataPoint {
                attributes: vec![KeyValue::new("route", "/")],
                count: 3,
                bounds: vec![10.0, 100.0],
                bucket_counts: vec![1, 1, 1],
                min: Some(4),
                max: Some(250),
                sum: 304,
                exemplars: vec![Exemplar {
                    filtered_attributes: vec![KeyValue::new("user", "u-1")],
                    time: collection_time(),
                    value: 250,
                    span_id: [1, 2, 3, 4, 5, 6, 7, 8],
                    trace_id: [0xab; 16],
                }],
            }],
            start_time: start_time(),
            time: collection_time(),
            temporality: Temporality::Cumulative,
        })),
    };
    wrap(vec![gauge, updown, histogram])
}

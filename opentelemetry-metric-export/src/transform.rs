//! Serializable view of a [`ResourceMetrics`] snapshot in the OTLP/JSON
//! shape.
//!
//! ```
//! # use opentelemetry_metric_export::data::ResourceMetrics;
//! use opentelemetry_metric_export::transform::MetricsData;
//!
//! let json = serde_json::to_string(&MetricsData::from(&ResourceMetrics::default())).unwrap();
//! assert!(json.starts_with("{\"resourceMetrics\":["));
//! ```
use std::borrow::Cow;
use std::time::{SystemTime, UNIX_EPOCH};

use opentelemetry::{Array, InstrumentationScope};
use serde::{Serialize, Serializer};

use crate::data::{self, ResourceMetrics as SdkResourceMetrics};
use crate::Resource as SdkResource;

/// Transformed metrics data that can be serialized.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MetricsData {
    resource_metrics: Vec<ResourceMetrics>,
}

impl From<&SdkResourceMetrics> for MetricsData {
    fn from(value: &SdkResourceMetrics) -> Self {
        MetricsData {
            resource_metrics: vec![value.into()],
        }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct ResourceMetrics {
    resource: Resource,
    scope_metrics: Vec<ScopeMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema_url: Option<String>,
}

impl From<&SdkResourceMetrics> for ResourceMetrics {
    fn from(value: &SdkResourceMetrics) -> Self {
        ResourceMetrics {
            resource: (&value.resource).into(),
            scope_metrics: value.scope_metrics.iter().map(Into::into).collect(),
            schema_url: value.resource.schema_url().map(Into::into),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct Resource {
    attributes: Vec<KeyValue>,
}

impl From<&SdkResource> for Resource {
    fn from(value: &SdkResource) -> Self {
        let mut attributes: Vec<KeyValue> = value
            .iter()
            .map(|(key, value)| KeyValue {
                key: key.as_str().to_owned(),
                value: value.clone().into(),
            })
            .collect();
        attributes.sort_by(|a, b| a.key.cmp(&b.key));
        Resource { attributes }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct Scope {
    #[serde(skip_serializing_if = "str::is_empty")]
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attributes: Vec<KeyValue>,
}

impl From<&InstrumentationScope> for Scope {
    fn from(value: &InstrumentationScope) -> Self {
        Scope {
            name: value.name().to_owned(),
            version: value.version().map(Into::into),
            attributes: value.attributes().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct ScopeMetrics {
    scope: Scope,
    metrics: Vec<Metric>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema_url: Option<String>,
}

impl From<&data::ScopeMetrics> for ScopeMetrics {
    fn from(value: &data::ScopeMetrics) -> Self {
        ScopeMetrics {
            scope: (&value.scope).into(),
            metrics: value.metrics.iter().map(Into::into).collect(),
            schema_url: value.scope.schema_url().map(Into::into),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct Metric {
    name: Cow<'static, str>,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: Cow<'static, str>,
    #[serde(skip_serializing_if = "str::is_empty")]
    unit: Cow<'static, str>,
    #[serde(flatten)]
    data: MetricData,
}

impl From<&data::Metric> for Metric {
    fn from(value: &data::Metric) -> Self {
        Metric {
            name: value.name.clone(),
            description: value.description.clone(),
            unit: value.unit.clone(),
            data: map_data(&value.data),
        }
    }
}

fn map_data(data: &data::AggregatedMetrics) -> MetricData {
    match data {
        data::AggregatedMetrics::F64(data) => map_typed(data),
        data::AggregatedMetrics::U64(data) => map_typed(data),
        data::AggregatedMetrics::I64(data) => map_typed(data),
    }
}

fn map_typed<T: Into<DataValue> + Copy>(data: &data::MetricData<T>) -> MetricData {
    match data {
        data::MetricData::Gauge(gauge) => MetricData::Gauge(gauge.into()),
        data::MetricData::Sum(sum) => MetricData::Sum(sum.into()),
        data::MetricData::Histogram(hist) => MetricData::Histogram(hist.into()),
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
enum MetricData {
    Gauge(Gauge),
    Sum(Sum),
    Histogram(Histogram),
}

// Flattened into its data point as either `asDouble` or `asInt`.
#[derive(Debug, Clone, Copy)]
enum DataValue {
    F64(f64),
    I64(i64),
    U64(u64),
}

impl Serialize for DataValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            DataValue::F64(v) => serializer.serialize_newtype_variant("DataValue", 0, "asDouble", v),
            DataValue::I64(v) => serializer.serialize_newtype_variant("DataValue", 1, "asInt", v),
            DataValue::U64(v) => serializer.serialize_newtype_variant("DataValue", 1, "asInt", v),
        }
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        DataValue::F64(value)
    }
}

impl From<i64> for DataValue {
    fn from(value: i64) -> Self {
        DataValue::I64(value)
    }
}

impl From<u64> for DataValue {
    fn from(value: u64) -> Self {
        DataValue::U64(value)
    }
}

// Untagged number for histogram sum, min and max.
#[derive(Serialize, Debug, Clone, Copy)]
#[serde(untagged)]
enum Number {
    F64(f64),
    I64(i64),
    U64(u64),
}

fn number<T: Into<DataValue>>(value: T) -> Number {
    match value.into() {
        DataValue::F64(v) => Number::F64(v),
        DataValue::I64(v) => Number::I64(v),
        DataValue::U64(v) => Number::U64(v),
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct Gauge {
    data_points: Vec<DataPoint>,
}

impl<T: Into<DataValue> + Copy> From<&data::Gauge<T>> for Gauge {
    fn from(value: &data::Gauge<T>) -> Self {
        Gauge {
            data_points: value
                .data_points
                .iter()
                .map(|point| DataPoint {
                    attributes: point.attributes.iter().map(Into::into).collect(),
                    start_time_unix_nano: value.start_time,
                    time_unix_nano: value.time,
                    value: point.value.into(),
                    exemplars: point.exemplars.iter().map(Into::into).collect(),
                })
                .collect(),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct Sum {
    data_points: Vec<DataPoint>,
    aggregation_temporality: u8,
    is_monotonic: bool,
}

impl<T: Into<DataValue> + Copy> From<&data::Sum<T>> for Sum {
    fn from(value: &data::Sum<T>) -> Self {
        Sum {
            data_points: value
                .data_points
                .iter()
                .map(|point| DataPoint {
                    attributes: point.attributes.iter().map(Into::into).collect(),
                    start_time_unix_nano: Some(value.start_time),
                    time_unix_nano: value.time,
                    value: point.value.into(),
                    exemplars: point.exemplars.iter().map(Into::into).collect(),
                })
                .collect(),
            aggregation_temporality: value.temporality.as_otlp(),
            is_monotonic: value.is_monotonic,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct DataPoint {
    attributes: Vec<KeyValue>,
    #[serde(
        serialize_with = "as_opt_unix_nano",
        skip_serializing_if = "Option::is_none"
    )]
    start_time_unix_nano: Option<SystemTime>,
    #[serde(serialize_with = "as_unix_nano")]
    time_unix_nano: SystemTime,
    #[serde(flatten)]
    value: DataValue,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    exemplars: Vec<Exemplar>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct Histogram {
    data_points: Vec<HistogramDataPoint>,
    aggregation_temporality: u8,
}

impl<T: Into<DataValue> + Copy> From<&data::Histogram<T>> for Histogram {
    fn from(value: &data::Histogram<T>) -> Self {
        Histogram {
            data_points: value
                .data_points
                .iter()
                .map(|point| HistogramDataPoint {
                    attributes: point.attributes.iter().map(Into::into).collect(),
                    start_time_unix_nano: value.start_time,
                    time_unix_nano: value.time,
                    count: point.count,
                    explicit_bounds: point.bounds.clone(),
                    bucket_counts: point.bucket_counts.clone(),
                    min: point.min.map(number),
                    max: point.max.map(number),
                    sum: number(point.sum),
                    exemplars: point.exemplars.iter().map(Into::into).collect(),
                })
                .collect(),
            aggregation_temporality: value.temporality.as_otlp(),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct HistogramDataPoint {
    attributes: Vec<KeyValue>,
    #[serde(serialize_with = "as_unix_nano")]
    start_time_unix_nano: SystemTime,
    #[serde(serialize_with = "as_unix_nano")]
    time_unix_nano: SystemTime,
    count: u64,
    explicit_bounds: Vec<f64>,
    bucket_counts: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<Number>,
    sum: Number,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    exemplars: Vec<Exemplar>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct Exemplar {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    filtered_attributes: Vec<KeyValue>,
    #[serde(serialize_with = "as_unix_nano")]
    time_unix_nano: SystemTime,
    #[serde(flatten)]
    value: DataValue,
    span_id: String,
    trace_id: String,
}

impl<T: Into<DataValue> + Copy> From<&data::Exemplar<T>> for Exemplar {
    fn from(value: &data::Exemplar<T>) -> Self {
        Exemplar {
            filtered_attributes: value.filtered_attributes.iter().map(Into::into).collect(),
            time_unix_nano: value.time,
            value: value.value.into(),
            span_id: format!("{:016x}", u64::from_be_bytes(value.span_id)),
            trace_id: format!("{:032x}", u128::from_be_bytes(value.trace_id)),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
struct KeyValue {
    key: String,
    value: Value,
}

impl From<&opentelemetry::KeyValue> for KeyValue {
    fn from(value: &opentelemetry::KeyValue) -> Self {
        KeyValue {
            key: value.key.as_str().to_owned(),
            value: value.value.clone().into(),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
enum Value {
    #[serde(rename = "boolValue")]
    Bool(bool),
    #[serde(rename = "intValue")]
    Int(i64),
    #[serde(rename = "doubleValue")]
    Double(f64),
    #[serde(rename = "stringValue")]
    String(String),
    #[serde(rename = "arrayValue")]
    Array(ArrayValue),
}

#[derive(Debug, Serialize, Clone)]
struct ArrayValue {
    values: Vec<Value>,
}

impl From<opentelemetry::Value> for Value {
    #[allow(unreachable_patterns)]
    fn from(value: opentelemetry::Value) -> Self {
        match value {
            opentelemetry::Value::Bool(b) => Value::Bool(b),
            opentelemetry::Value::I64(i) => Value::Int(i),
            opentelemetry::Value::F64(f) => Value::Double(f),
            opentelemetry::Value::String(s) => Value::String(s.into()),
            opentelemetry::Value::Array(a) => Value::Array(ArrayValue {
                values: match a {
                    Array::Bool(b) => b.into_iter().map(Value::Bool).collect(),
                    Array::I64(i) => i.into_iter().map(Value::Int).collect(),
                    Array::F64(f) => f.into_iter().map(Value::Double).collect(),
                    Array::String(s) => s.into_iter().map(|s| Value::String(s.into())).collect(),
                    other => vec![Value::String(other.to_string())],
                },
            }),
            other => Value::String(other.to_string()),
        }
    }
}

fn as_unix_nano<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let nanos = time
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    serializer.serialize_u64(u64::try_from(nanos).unwrap_or(u64::MAX))
}

fn as_opt_unix_nano<S>(time: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match time {
        None => serializer.serialize_none(),
        Some(time) => as_unix_nano(time, serializer),
    }
}

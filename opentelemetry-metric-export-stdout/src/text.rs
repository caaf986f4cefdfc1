use std::fmt::Display;
use std::io::{self, Write};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use opentelemetry_metric_export::data::{
    AggregatedMetrics, Exemplar, Gauge, Histogram, MetricData, ResourceMetrics, Sum, Temporality,
};

/// Render `metrics` as indented text, one field per line.
pub(crate) fn write_metrics(out: &mut impl Write, metrics: &ResourceMetrics) -> io::Result<()> {
    writeln!(out, "Metrics")?;
    writeln!(out, "Resource")?;
    if let Some(schema_url) = metrics.resource.schema_url() {
        writeln!(out, "\tResource SchemaUrl: {schema_url:?}")?;
    }
    let mut attributes: Vec<_> = metrics.resource.iter().collect();
    attributes.sort_by(|(a, _), (b, _)| a.as_str().cmp(b.as_str()));
    for (key, value) in attributes {
        writeln!(out, "\t ->  {key}={value}")?;
    }

    for (i, scope_metrics) in metrics.scope_metrics.iter().enumerate() {
        let scope = &scope_metrics.scope;
        writeln!(out, "\tInstrumentation Scope #{i}")?;
        writeln!(out, "\t\tName         : {}", scope.name())?;
        if let Some(version) = scope.version() {
            writeln!(out, "\t\tVersion  : {version:?}")?;
        }
        if let Some(schema_url) = scope.schema_url() {
            writeln!(out, "\t\tSchemaUrl: {schema_url:?}")?;
        }
        for kv in scope.attributes() {
            writeln!(out, "\t\t\t ->  {}: {}", kv.key, kv.value)?;
        }

        for (j, metric) in scope_metrics.metrics.iter().enumerate() {
            writeln!(out, "\tMetric #{j}")?;
            writeln!(out, "\t\tName         : {}", metric.name)?;
            writeln!(out, "\t\tDescription  : {}", metric.description)?;
            writeln!(out, "\t\tUnit         : {}", metric.unit)?;
            match &metric.data {
                AggregatedMetrics::F64(data) => write_data(out, data)?,
                AggregatedMetrics::U64(data) => write_data(out, data)?,
                AggregatedMetrics::I64(data) => write_data(out, data)?,
            }
        }
    }
    Ok(())
}

fn write_data<T: Display>(out: &mut impl Write, data: &MetricData<T>) -> io::Result<()> {
    match data {
        MetricData::Gauge(gauge) => {
            writeln!(out, "\t\tType         : Gauge")?;
            write_gauge(out, gauge)
        }
        MetricData::Sum(sum) => {
            writeln!(out, "\t\tType         : Sum")?;
            write_sum(out, sum)
        }
        MetricData::Histogram(hist) => {
            writeln!(out, "\t\tType         : Histogram")?;
            write_histogram(out, hist)
        }
    }
}

fn write_gauge<T: Display>(out: &mut impl Write, gauge: &Gauge<T>) -> io::Result<()> {
    writeln!(out, "\t\tGauge DataPoints")?;
    if let Some(start_time) = gauge.start_time {
        writeln!(out, "\t\tStartTime    : {}", format_time(start_time))?;
    }
    writeln!(out, "\t\tEndTime      : {}", format_time(gauge.time))?;
    for (i, point) in gauge.data_points.iter().enumerate() {
        writeln!(out, "\t\tDataPoint #{i}")?;
        writeln!(out, "\t\t\tValue        : {}", point.value)?;
        write_attributes(out, &point.attributes)?;
        write_exemplars(out, &point.exemplars)?;
    }
    Ok(())
}

fn write_sum<T: Display>(out: &mut impl Write, sum: &Sum<T>) -> io::Result<()> {
    writeln!(out, "\t\tSum DataPoints")?;
    writeln!(out, "\t\tMonotonic    : {}", sum.is_monotonic)?;
    write_temporality(out, sum.temporality)?;
    writeln!(out, "\t\tStartTime    : {}", format_time(sum.start_time))?;
    writeln!(out, "\t\tEndTime      : {}", format_time(sum.time))?;
    for (i, point) in sum.data_points.iter().enumerate() {
        writeln!(out, "\t\tDataPoint #{i}")?;
        writeln!(out, "\t\t\tValue        : {}", point.value)?;
        write_attributes(out, &point.attributes)?;
        write_exemplars(out, &point.exemplars)?;
    }
    Ok(())
}

fn write_histogram<T: Display>(out: &mut impl Write, hist: &Histogram<T>) -> io::Result<()> {
    writeln!(out, "\t\tHistogram DataPoints")?;
    write_temporality(out, hist.temporality)?;
    writeln!(out, "\t\tStartTime    : {}", format_time(hist.start_time))?;
    writeln!(out, "\t\tEndTime      : {}", format_time(hist.time))?;
    for (i, point) in hist.data_points.iter().enumerate() {
        writeln!(out, "\t\tDataPoint #{i}")?;
        writeln!(out, "\t\t\tCount        : {}", point.count)?;
        writeln!(out, "\t\t\tSum          : {}", point.sum)?;
        if let Some(min) = &point.min {
            writeln!(out, "\t\t\tMin          : {min}")?;
        }
        if let Some(max) = &point.max {
            writeln!(out, "\t\t\tMax          : {max}")?;
        }
        write_attributes(out, &point.attributes)?;
        writeln!(out, "\t\t\tBuckets")?;
        let mut lower = String::from("-inf");
        for (bound, count) in point.bounds.iter().zip(point.bucket_counts.iter()) {
            writeln!(out, "\t\t\t\t {lower} to {bound} : {count}")?;
            lower = bound.to_string();
        }
        if let Some(last) = point.bucket_counts.get(point.bounds.len()) {
            writeln!(out, "\t\t\t\t {lower} to +inf : {last}")?;
        }
        write_exemplars(out, &point.exemplars)?;
    }
    Ok(())
}

fn write_temporality(out: &mut impl Write, temporality: Temporality) -> io::Result<()> {
    let name = match temporality {
        Temporality::Delta => "Delta",
        _ => "Cumulative",
    };
    writeln!(out, "\t\tTemporality  : {name}")
}

fn write_attributes(out: &mut impl Write, attributes: &[KeyValue]) -> io::Result<()> {
    writeln!(out, "\t\t\tAttributes   :")?;
    for kv in attributes {
        writeln!(out, "\t\t\t\t ->  {}: {}", kv.key, kv.value)?;
    }
    Ok(())
}

fn write_exemplars<T: Display>(out: &mut impl Write, exemplars: &[Exemplar<T>]) -> io::Result<()> {
    for (i, exemplar) in exemplars.iter().enumerate() {
        writeln!(out, "\t\t\tExemplar #{i}")?;
        writeln!(out, "\t\t\t\tValue        : {}", exemplar.value)?;
        writeln!(out, "\t\t\t\tTime         : {}", format_time(exemplar.time))?;
        writeln!(
            out,
            "\t\t\t\tTraceId      : {:032x}",
            u128::from_be_bytes(exemplar.trace_id)
        )?;
        writeln!(
            out,
            "\t\t\t\tSpanId       : {:016x}",
            u64::from_be_bytes(exemplar.span_id)
        )?;
    }
    Ok(())
}

fn format_time(time: SystemTime) -> String {
    let datetime: DateTime<Utc> = time.into();
    datetime.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

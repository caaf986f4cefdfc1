//! Environment based configuration of the HTTP exporter.
//!
//! Signal specific variables win over the generic `OTEL_EXPORTER_OTLP_*`
//! ones; values passed to the builder win over both.
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use http::header::{HeaderName, HeaderValue};
use http::Uri;
use percent_encoding::percent_decode_str;

use crate::ExporterBuildError;

/// Target to which the exporter is going to send metrics, used as-is.
pub const OTEL_EXPORTER_OTLP_METRICS_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_METRICS_ENDPOINT";
/// Base endpoint shared by all signals; `/v1/metrics` is appended.
pub const OTEL_EXPORTER_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
/// Default target to which the exporter is going to send metrics.
pub const OTEL_EXPORTER_OTLP_METRICS_ENDPOINT_DEFAULT: &str = "http://localhost:4318/v1/metrics";
/// Maximum time in milliseconds the exporter waits for each batch export.
pub const OTEL_EXPORTER_OTLP_METRICS_TIMEOUT: &str = "OTEL_EXPORTER_OTLP_METRICS_TIMEOUT";
/// Maximum time in milliseconds the exporter waits for each export, all signals.
pub const OTEL_EXPORTER_OTLP_TIMEOUT: &str = "OTEL_EXPORTER_OTLP_TIMEOUT";
/// Default export timeout.
pub const OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT: Duration = Duration::from_millis(10_000);
/// Key-value pairs to be used as headers for metric exports.
pub const OTEL_EXPORTER_OTLP_METRICS_HEADERS: &str = "OTEL_EXPORTER_OTLP_METRICS_HEADERS";
/// Key-value pairs to be used as headers for all exports.
pub const OTEL_EXPORTER_OTLP_HEADERS: &str = "OTEL_EXPORTER_OTLP_HEADERS";

const METRICS_PATH: &str = "/v1/metrics";

pub(crate) fn resolve_endpoint(provided: Option<&str>) -> Result<Uri, ExporterBuildError> {
    // programmatic configuration overrides any value set via environment variables
    if let Some(endpoint) = provided {
        return endpoint
            .parse()
            .map_err(|err: http::uri::InvalidUri| {
                ExporterBuildError::InvalidUri(endpoint.to_string(), err.to_string())
            });
    }

    // per signal env var is not modified
    if let Some(endpoint) = env::var(OTEL_EXPORTER_OTLP_METRICS_ENDPOINT)
        .ok()
        .and_then(|s| s.parse().ok())
    {
        return Ok(endpoint);
    }

    if let Some(endpoint) = env::var(OTEL_EXPORTER_OTLP_ENDPOINT)
        .ok()
        .and_then(|s| build_endpoint_uri(&s, METRICS_PATH).ok())
    {
        return Ok(endpoint);
    }

    Ok(Uri::from_static(OTEL_EXPORTER_OTLP_METRICS_ENDPOINT_DEFAULT))
}

fn build_endpoint_uri(endpoint: &str, path: &str) -> Result<Uri, ExporterBuildError> {
    let uri = format!("{}{path}", endpoint.trim_end_matches('/'));
    uri.parse()
        .map_err(|err: http::uri::InvalidUri| ExporterBuildError::InvalidUri(uri, err.to_string()))
}

/// Zero timeouts, provided or from the environment, are ignored.
pub(crate) fn resolve_timeout(provided: Option<Duration>) -> Duration {
    if let Some(timeout) = provided.filter(|timeout| !timeout.is_zero()) {
        return timeout;
    }
    [OTEL_EXPORTER_OTLP_METRICS_TIMEOUT, OTEL_EXPORTER_OTLP_TIMEOUT]
        .iter()
        .find_map(|var| {
            env::var(var)
                .ok()
                .and_then(|s| s.trim().parse::<u64>().ok())
                .filter(|millis| *millis > 0)
        })
        .map(Duration::from_millis)
        .unwrap_or(OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT)
}

/// Headers from the environment, overridden by `provided`.
#[allow(clippy::mutable_key_type)] // http headers are not mutated
pub(crate) fn resolve_headers(
    provided: &HashMap<String, String>,
) -> Result<HashMap<HeaderName, HeaderValue>, ExporterBuildError> {
    let mut headers = HashMap::new();

    // signal specific env var is preferred over general
    if let Ok(input) =
        env::var(OTEL_EXPORTER_OTLP_METRICS_HEADERS).or_else(|_| env::var(OTEL_EXPORTER_OTLP_HEADERS))
    {
        headers.extend(parse_header_string(&input).filter_map(|(key, value)| {
            Some((
                HeaderName::from_str(key).ok()?,
                HeaderValue::from_str(&value).ok()?,
            ))
        }));
    }

    for (key, value) in provided {
        let name = HeaderName::from_str(key).map_err(|err| ExporterBuildError::InvalidConfig {
            name: format!("header name {key:?}"),
            reason: err.to_string(),
        })?;
        let value = HeaderValue::from_str(value).map_err(|err| ExporterBuildError::InvalidConfig {
            name: format!("header value for {key:?}"),
            reason: err.to_string(),
        })?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn parse_header_string(value: &str) -> impl Iterator<Item = (&str, String)> {
    value
        .split_terminator(',')
        .map(str::trim)
        .filter_map(parse_header_key_value_string)
}

fn parse_header_key_value_string(key_value_string: &str) -> Option<(&str, String)> {
    key_value_string
        .split_once('=')
        .map(|(key, value)| {
            let value = value.trim();
            (
                key.trim(),
                percent_decode_str(value)
                    .decode_utf8()
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or_else(|_| value.to_string()),
            )
        })
        .filter(|(key, value)| !key.is_empty() && !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const ENDPOINT_VARS: [&str; 2] = [OTEL_EXPORTER_OTLP_METRICS_ENDPOINT, OTEL_EXPORTER_OTLP_ENDPOINT];

    fn with_endpoint_env<F: FnOnce()>(signal: Option<&str>, generic: Option<&str>, f: F) {
        temp_env::with_vars([(ENDPOINT_VARS[0], signal), (ENDPOINT_VARS[1], generic)], f);
    }

    #[test]
    fn default_endpoint_when_nothing_is_set() {
        with_endpoint_env(None, None, || {
            assert_eq!(
                resolve_endpoint(None).unwrap(),
                OTEL_EXPORTER_OTLP_METRICS_ENDPOINT_DEFAULT
            );
        });
    }

    #[test]
    fn generic_endpoint_gets_signal_path() {
        with_endpoint_env(None, Some("http://collector:4318"), || {
            assert_eq!(
                resolve_endpoint(None).unwrap(),
                "http://collector:4318/v1/metrics"
            );
        });
        with_endpoint_env(None, Some("http://collector:4318/"), || {
            assert_eq!(
                resolve_endpoint(None).unwrap(),
                "http://collector:4318/v1/metrics"
            );
        });
    }

    #[test]
    fn signal_endpoint_is_used_as_is_and_wins() {
        with_endpoint_env(
            Some("http://metrics.example.com/custom"),
            Some("http://wrong.example.com"),
            || {
                assert_eq!(
                    resolve_endpoint(None).unwrap(),
                    "http://metrics.example.com/custom"
                );
            },
        );
    }

    #[test]
    fn provided_endpoint_wins_over_env() {
        with_endpoint_env(Some("http://env.example.com/v1/metrics"), None, || {
            assert_eq!(
                resolve_endpoint(Some("http://builder.example.com/m")).unwrap(),
                "http://builder.example.com/m"
            );
        });
    }

    #[test]
    fn invalid_provided_endpoint_is_an_error() {
        assert!(matches!(
            resolve_endpoint(Some("not a uri")),
            Err(ExporterBuildError::InvalidUri(..))
        ));
    }

    #[test]
    fn timeout_resolution_order() {
        temp_env::with_vars(
            [
                (OTEL_EXPORTER_OTLP_METRICS_TIMEOUT, Some("250")),
                (OTEL_EXPORTER_OTLP_TIMEOUT, Some("500")),
            ],
            || {
                assert_eq!(resolve_timeout(None), Duration::from_millis(250));
                assert_eq!(
                    resolve_timeout(Some(Duration::from_secs(1))),
                    Duration::from_secs(1)
                );
            },
        );
        temp_env::with_vars(
            [
                (OTEL_EXPORTER_OTLP_METRICS_TIMEOUT, Some("soon")),
                (OTEL_EXPORTER_OTLP_TIMEOUT, Some("500")),
            ],
            || assert_eq!(resolve_timeout(None), Duration::from_millis(500)),
        );
        temp_env::with_vars(
            [
                (OTEL_EXPORTER_OTLP_METRICS_TIMEOUT, None::<&str>),
                (OTEL_EXPORTER_OTLP_TIMEOUT, None),
            ],
            || assert_eq!(resolve_timeout(None), OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT),
        );
    }

    #[rstest]
    #[case(Some(Duration::ZERO), None, None, OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT)]
    #[case(Some(Duration::ZERO), Some("300"), None, Duration::from_millis(300))]
    #[case(None, Some("0"), None, OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT)]
    #[case(None, Some("0"), Some("700"), Duration::from_millis(700))]
    #[case(None, None, Some("0"), OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT)]
    fn zero_timeouts_are_ignored(
        #[case] provided: Option<Duration>,
        #[case] signal: Option<&str>,
        #[case] generic: Option<&str>,
        #[case] expected: Duration,
    ) {
        temp_env::with_vars(
            [
                (OTEL_EXPORTER_OTLP_METRICS_TIMEOUT, signal),
                (OTEL_EXPORTER_OTLP_TIMEOUT, generic),
            ],
            || assert_eq!(resolve_timeout(provided), expected),
        );
    }

    #[rstest]
    #[case("k1=v1,k2=v2", vec![("k1", "v1"), ("k2", "v2")])]
    #[case(" k1 = v1 , k2=v2 ,", vec![("k1", "v1"), ("k2", "v2")])]
    #[case("api-key=a%20b", vec![("api-key", "a b")])]
    #[case("novalue=,=nokey,k=v", vec![("k", "v")])]
    #[case("", vec![])]
    fn parses_header_strings(#[case] input: &str, #[case] expected: Vec<(&str, &str)>) {
        let parsed: Vec<_> = parse_header_string(input).collect();
        let expected: Vec<_> = expected
            .into_iter()
            .map(|(k, v)| (k, v.to_string()))
            .collect();
        assert_eq!(parsed, expected);
    }

    #[test]
    #[allow(clippy::mutable_key_type)]
    fn provided_headers_override_env() {
        temp_env::with_vars(
            [
                (OTEL_EXPORTER_OTLP_METRICS_HEADERS, Some("tenant=env,region=eu")),
                (OTEL_EXPORTER_OTLP_HEADERS, Some("ignored=yes")),
            ],
            || {
                let provided = HashMap::from([("tenant".to_string(), "builder".to_string())]);
                let headers = resolve_headers(&provided).unwrap();
                assert_eq!(headers.len(), 2);
                assert_eq!(headers[&HeaderName::from_static("tenant")], "builder");
                assert_eq!(headers[&HeaderName::from_static("region")], "eu");
            },
        );
    }
}

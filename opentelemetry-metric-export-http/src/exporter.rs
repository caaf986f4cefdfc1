use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use http::{Method, Request, Uri};
use opentelemetry::otel_debug;
use opentelemetry_metric_export::data::ResourceMetrics;
use opentelemetry_metric_export::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_metric_export::transform::MetricsData;
use opentelemetry_metric_export::{ExportContext, PushMetricExporter, ShutdownLatch};

use crate::config::{resolve_endpoint, resolve_headers, resolve_timeout};
use crate::retry::{classify_http_error, retry_with_backoff, RetryErrorType, RetryPolicy};
use crate::{ExporterBuildError, HttpClient};

/// A [`PushMetricExporter`] that POSTs each snapshot as an OTLP/JSON body.
///
/// Transient failures (throttling, server errors, lost connections) are
/// retried with exponential backoff inside [`export`]; the whole loop is
/// bounded by the earlier of the caller's context and the configured
/// timeout.
///
/// [`export`]: PushMetricExporter::export
pub struct MetricExporter {
    client: Mutex<Option<Arc<dyn HttpClient>>>,
    endpoint: Uri,
    #[allow(clippy::mutable_key_type)] // http headers are not mutated
    headers: HashMap<HeaderName, HeaderValue>,
    timeout: Duration,
    retry_policy: RetryPolicy,
    latch: ShutdownLatch,
}

impl fmt::Debug for MetricExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricExporter")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("retry_policy", &self.retry_policy)
            .field("is_shutdown", &self.latch.is_shutdown())
            .finish()
    }
}

impl MetricExporter {
    /// Create a builder to configure this exporter.
    pub fn builder() -> MetricExporterBuilder {
        MetricExporterBuilder::default()
    }

    /// The resolved collector endpoint.
    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    /// The time budget of a single export, retries included.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn build_request(&self, body: Bytes) -> Result<Request<Bytes>, HttpExportError> {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .map_err(|err| HttpExportError {
                status_code: 400,
                retry_after: None,
                message: format!("Failed to build HTTP request: {err}"),
            })?;
        for (k, v) in &self.headers {
            request.headers_mut().insert(k.clone(), v.clone());
        }
        Ok(request)
    }

    async fn send_once(
        &self,
        client: &Arc<dyn HttpClient>,
        body: Bytes,
    ) -> Result<(), HttpExportError> {
        let request = self.build_request(body)?;
        otel_debug!(name: "HttpMetricExporter.ExportStarted");

        let response = client
            .send_bytes(request)
            .await
            .map_err(|err| HttpExportError {
                status_code: 0,
                retry_after: None,
                message: format!("Network error: {err}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpExportError {
                status_code: status.as_u16(),
                retry_after: response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
                message: format!(
                    "HTTP export failed. Url: {}, Status: {}, Response: {:?}",
                    self.endpoint,
                    status.as_u16(),
                    response.body()
                ),
            });
        }

        otel_debug!(name: "HttpMetricExporter.ExportSucceeded");
        Ok(())
    }
}

/// A failed attempt, kept until the retry loop decides what to do with it.
#[derive(Debug)]
struct HttpExportError {
    // 0 when no response was received.
    status_code: u16,
    retry_after: Option<String>,
    message: String,
}

impl fmt::Display for HttpExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<HttpExportError> for OTelSdkError {
    fn from(err: HttpExportError) -> Self {
        OTelSdkError::InternalFailure(err.message)
    }
}

fn classify_http_export_error(err: &HttpExportError) -> RetryErrorType {
    classify_http_error(err.status_code, err.retry_after.as_deref())
}

impl PushMetricExporter for MetricExporter {
    async fn export(&self, ctx: &ExportContext, metrics: &ResourceMetrics) -> OTelSdkResult {
        self.latch.ensure_active()?;
        ctx.check()?;
        let client = self
            .client
            .lock()?
            .as_ref()
            .cloned()
            .ok_or(OTelSdkError::AlreadyShutdown)?;

        // Serialized once, shared by every attempt.
        let body: Bytes = serde_json::to_vec(&MetricsData::from(metrics))
            .map_err(|err| OTelSdkError::InternalFailure(format!("Failed to serialize metrics: {err}")))?
            .into();

        let ctx = ctx.child_with_timeout(self.timeout);
        retry_with_backoff(
            &ctx,
            &self.retry_policy,
            classify_http_export_error,
            "HttpMetricExporter.Export",
            || self.send_once(&client, body.clone()),
        )
        .await
    }

    async fn force_flush(&self, ctx: &ExportContext) -> OTelSdkResult {
        // Nothing is buffered between exports.
        self.latch.ensure_active()?;
        ctx.check()
    }

    async fn shutdown(&self, _ctx: &ExportContext) -> OTelSdkResult {
        self.latch.shut_down()?;
        let released = self.client.lock()?.take().is_some();
        otel_debug!(name: "HttpMetricExporter.Shutdown", client_released = released);
        Ok(())
    }
}

/// Configuration for the HTTP metrics exporter.
///
/// Unset values are read from the `OTEL_EXPORTER_OTLP_*` environment
/// variables when [`build`](MetricExporterBuilder::build) runs.
#[derive(Default)]
pub struct MetricExporterBuilder {
    endpoint: Option<String>,
    headers: HashMap<String, String>,
    timeout: Option<Duration>,
    client: Option<Arc<dyn HttpClient>>,
    retry_policy: Option<RetryPolicy>,
}

impl fmt::Debug for MetricExporterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricExporterBuilder")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("retry_policy", &self.retry_policy)
            .finish()
    }
}

impl MetricExporterBuilder {
    /// Set the full URL metrics are posted to, used as-is.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Add headers sent with every request. They override headers of the
    /// same name from the environment.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Set the time budget of a single export, retries included. Zero is
    /// ignored.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Assign the HTTP client used to send requests.
    pub fn with_http_client<T: HttpClient + 'static>(mut self, client: T) -> Self {
        self.client = Some(Arc::new(client));
        self
    }

    /// Set the [`RetryPolicy`] applied to failed attempts.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Create a metrics exporter with the current configuration.
    pub fn build(self) -> Result<MetricExporter, ExporterBuildError> {
        let endpoint = resolve_endpoint(self.endpoint.as_deref())?;
        let timeout = resolve_timeout(self.timeout);
        #[allow(clippy::mutable_key_type)] // http headers are not mutated
        let headers = resolve_headers(&self.headers)?;
        let client = match self.client {
            Some(client) => client,
            None => default_client()?,
        };

        otel_debug!(
            name: "HttpMetricExporter.Built",
            endpoint = endpoint.to_string(),
            timeout_in_millisecs = timeout.as_millis()
        );

        Ok(MetricExporter {
            client: Mutex::new(Some(client)),
            endpoint,
            headers,
            timeout,
            retry_policy: self.retry_policy.unwrap_or_default(),
            latch: ShutdownLatch::new(),
        })
    }
}

#[cfg(feature = "reqwest-client")]
fn default_client() -> Result<Arc<dyn HttpClient>, ExporterBuildError> {
    Ok(Arc::new(reqwest::Client::new()))
}

#[cfg(not(feature = "reqwest-client"))]
fn default_client() -> Result<Arc<dyn HttpClient>, ExporterBuildError> {
    Err(ExporterBuildError::NoHttpClient)
}

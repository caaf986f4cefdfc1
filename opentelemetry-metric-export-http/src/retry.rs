//! Retrying exports with exponential backoff and jitter.
//!
//! Failed attempts are classified by [`classify_http_error`]: throttling
//! (`429`) and server errors (`5xx`) are retried, other client errors are
//! not. Every attempt and every backoff wait runs under the caller's
//! [`ExportContext`], so the deadline bounds the whole retry loop.

use std::future::Future;
use std::time::{Duration, SystemTime};

use futures_timer::Delay;
use opentelemetry::otel_warn;
use opentelemetry_metric_export::error::OTelSdkError;
use opentelemetry_metric_export::ExportContext;

// Servers asking for longer pauses are not waited on beyond this.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(600);

/// Configuration for retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts.
    pub max_retries: usize,
    /// Initial delay in milliseconds before the first retry.
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds between retries.
    pub max_delay_ms: u64,
    /// Maximum jitter in milliseconds to add to the delay.
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 1600,
            jitter_ms: 100,
        }
    }
}

/// How a failed attempt should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorType {
    /// The request will fail the same way again.
    NonRetryable,
    /// Transient failure, retry after the backoff delay.
    Retryable,
    /// The server asked to wait this long before retrying.
    Throttled(Duration),
}

/// Classifies HTTP errors based on status code and the `Retry-After` header.
///
/// A status code of `0` stands for "no response" (connection refused, reset,
/// DNS failure) and is retryable.
pub fn classify_http_error(status_code: u16, retry_after_header: Option<&str>) -> RetryErrorType {
    match status_code {
        429 => retry_after_header
            .and_then(parse_retry_after)
            .map(RetryErrorType::Throttled)
            .unwrap_or(RetryErrorType::Retryable),
        500..=599 => RetryErrorType::Retryable,
        400..=499 => RetryErrorType::NonRetryable,
        _ => RetryErrorType::Retryable,
    }
}

// Only the delay-seconds form is understood; HTTP dates fall back to the
// regular backoff.
fn parse_retry_after(retry_after: &str) -> Option<Duration> {
    retry_after
        .trim()
        .parse::<u64>()
        .ok()
        .map(|seconds| Duration::from_secs(seconds).min(MAX_RETRY_AFTER))
}

// Generates a random jitter value up to max_jitter
fn generate_jitter(max_jitter: u64) -> u64 {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|elapsed| elapsed.subsec_nanos())
        .unwrap_or_default();
    nanos as u64 % max_jitter.saturating_add(1)
}

/// Retries `operation` according to `policy` until it succeeds, fails with a
/// non-retryable error, runs out of retries, or `ctx` fires.
///
/// The last operation error is converted into an [`OTelSdkError`]; a context
/// that fires mid-attempt or mid-wait yields its own timeout or cancellation
/// error instead.
pub(crate) async fn retry_with_backoff<F, Fut, T, E, C>(
    ctx: &ExportContext,
    policy: &RetryPolicy,
    classify: C,
    operation_name: &str,
    mut operation: F,
) -> Result<T, OTelSdkError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> RetryErrorType,
    E: std::fmt::Display + Into<OTelSdkError>,
{
    let mut attempt = 0;
    let mut delay = policy.initial_delay_ms;

    loop {
        let err = match ctx.run(async { Ok(operation().await) }).await? {
            Ok(result) => return Ok(result),
            Err(err) => err,
        };

        let wait = match classify(&err) {
            RetryErrorType::NonRetryable => return Err(err.into()),
            _ if attempt >= policy.max_retries => return Err(err.into()),
            RetryErrorType::Throttled(server_delay) => server_delay,
            RetryErrorType::Retryable => {
                let jitter = generate_jitter(policy.jitter_ms);
                Duration::from_millis(delay.saturating_add(jitter).min(policy.max_delay_ms))
            }
        };

        attempt += 1;
        otel_warn!(
            name: "HttpMetricExporter.Retrying",
            operation = operation_name.to_string(),
            attempt = attempt,
            delay_ms = wait.as_millis() as u64,
            error = format!("{err}")
        );
        ctx.run(async {
            Delay::new(wait).await;
            Ok(())
        })
        .await?;
        delay = delay.saturating_mul(2).min(policy.max_delay_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct StatusError(u16);

    impl std::fmt::Display for StatusError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "status {}", self.0)
        }
    }

    impl From<StatusError> for OTelSdkError {
        fn from(err: StatusError) -> Self {
            OTelSdkError::InternalFailure(err.to_string())
        }
    }

    fn classify(err: &StatusError) -> RetryErrorType {
        classify_http_error(err.0, None)
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 4,
            jitter_ms: 1,
        }
    }

    #[rstest]
    #[case(429, None, RetryErrorType::Retryable)]
    #[case(429, Some("30"), RetryErrorType::Throttled(Duration::from_secs(30)))]
    #[case(429, Some(" 7 "), RetryErrorType::Throttled(Duration::from_secs(7)))]
    #[case(429, Some("3600"), RetryErrorType::Throttled(Duration::from_secs(600)))]
    #[case(429, Some("Fri, 31 Dec 1999 23:59:59 GMT"), RetryErrorType::Retryable)]
    #[case(500, None, RetryErrorType::Retryable)]
    #[case(503, Some("5"), RetryErrorType::Retryable)]
    #[case(400, None, RetryErrorType::NonRetryable)]
    #[case(404, None, RetryErrorType::NonRetryable)]
    #[case(0, None, RetryErrorType::Retryable)]
    fn classifies_status_codes(
        #[case] status: u16,
        #[case] retry_after: Option<&str>,
        #[case] expected: RetryErrorType,
    ) {
        assert_eq!(classify_http_error(status, retry_after), expected);
    }

    #[test]
    fn jitter_stays_within_bound() {
        for _ in 0..100 {
            assert!(generate_jitter(100) <= 100);
        }
        assert_eq!(generate_jitter(0), 0);
        assert!(generate_jitter(u64::MAX) < u64::from(u32::MAX));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let attempts = AtomicUsize::new(0);
        let ctx = ExportContext::with_timeout(Duration::from_secs(5));

        let result = retry_with_backoff(&ctx, &fast_policy(), classify, "test", || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(StatusError(503))
                } else {
                    Ok("sent")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("sent"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let attempts = AtomicUsize::new(0);
        let ctx = ExportContext::with_timeout(Duration::from_secs(5));

        let result: Result<(), _> = retry_with_backoff(&ctx, &fast_policy(), classify, "test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(StatusError(500)) }
        })
        .await;

        assert_eq!(
            result,
            Err(OTelSdkError::InternalFailure("status 500".into()))
        );
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let attempts = AtomicUsize::new(0);
        let ctx = ExportContext::with_timeout(Duration::from_secs(5));

        let result: Result<(), _> = retry_with_backoff(&ctx, &fast_policy(), classify, "test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(StatusError(400)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn deadline_cuts_backoff_short() {
        let attempts = AtomicUsize::new(0);
        let ctx = ExportContext::with_timeout(Duration::from_millis(50));
        let slow = RetryPolicy {
            max_retries: 10,
            initial_delay_ms: 10_000,
            max_delay_ms: 10_000,
            jitter_ms: 0,
        };

        let result: Result<(), _> = retry_with_backoff(&ctx, &slow, classify, "test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(StatusError(503)) }
        })
        .await;

        assert_eq!(
            result,
            Err(OTelSdkError::Timeout(Duration::from_millis(50)))
        );
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
